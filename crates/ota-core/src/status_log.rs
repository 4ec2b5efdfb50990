use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use ota_ports::{StatusLogEntry, StatusReport, UpdateStatus, UpdateType};

/// How many of an app's most recent entries are searched for a resumable
/// attempt.
pub const RECENT_ENTRY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created(u64),
    Updated(u64),
}

impl RecordOutcome {
    #[must_use]
    pub fn id(self) -> u64 {
        match self {
            Self::Created(id) | Self::Updated(id) => id,
        }
    }
}

#[derive(Default)]
struct LogState {
    entries: Vec<StatusLogEntry>,
    next_id: u64,
}

impl LogState {
    fn push(&mut self, mut entry: StatusLogEntry) -> u64 {
        self.next_id += 1;
        entry.id = self.next_id;
        self.entries.push(entry);
        self.next_id
    }
}

/// Registry-side log of update attempts, one row per logical attempt.
#[derive(Default)]
pub struct StatusLog {
    state: Mutex<LogState>,
}

impl StatusLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh entry unconditionally.
    pub fn insert(
        &self,
        app_id: &str,
        device_id: &str,
        from_version: &str,
        to_version: &str,
        update_type: UpdateType,
        status: UpdateStatus,
    ) -> u64 {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.push(StatusLogEntry {
            id: 0,
            app_id: app_id.to_string(),
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            update_type,
            device_id: device_id.to_string(),
            status,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a client report: transition the newest resumable entry for the
    /// same `(to_version, device_id)` within the recent window, or insert a
    /// new entry when none exists.
    pub fn record(&self, app_id: &str, device_id: &str, report: &StatusReport) -> RecordOutcome {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let resumable = state
            .entries
            .iter_mut()
            .rev()
            .filter(|entry| entry.app_id == app_id)
            .take(RECENT_ENTRY_WINDOW)
            .find(|entry| {
                entry.to_version == report.to_version
                    && entry.device_id == device_id
                    && entry.status.is_resumable()
            });

        if let Some(entry) = resumable {
            entry.status = report.status;
            entry.error_message.clone_from(&report.error_message);
            entry.updated_at = Utc::now();
            return RecordOutcome::Updated(entry.id);
        }

        let now = Utc::now();
        RecordOutcome::Created(state.push(StatusLogEntry {
            id: 0,
            app_id: app_id.to_string(),
            from_version: report.from_version.clone(),
            to_version: report.to_version.clone(),
            update_type: report.update_type,
            device_id: device_id.to_string(),
            status: report.status,
            error_message: report.error_message.clone(),
            created_at: now,
            updated_at: now,
        }))
    }

    /// Newest first.
    #[must_use]
    pub fn recent(&self, app_id: &str, limit: usize) -> Vec<StatusLogEntry> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.app_id == app_id)
            .take(limit)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
