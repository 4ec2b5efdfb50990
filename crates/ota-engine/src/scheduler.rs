use std::sync::Arc;

use log::{debug, info};
use ota_ports::NetworkState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::EngineContext;
use crate::session;

/// Background task that triggers sessions from the timer and from network
/// transitions.
pub(crate) struct Scheduler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub(crate) fn spawn(runtime: &tokio::runtime::Handle, context: Arc<EngineContext>) -> Self {
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run(context, cancel.clone()));
        Self { cancel, task }
    }

    /// Ends the scheduling loop. Sessions it already spawned are detached
    /// and finish on their own.
    pub(crate) fn stop(self) {
        self.cancel.cancel();
        drop(self.task);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Timer,
    WifiConnected,
}

async fn run(context: Arc<EngineContext>, cancel: CancellationToken) {
    let mut network = context.ports.network.subscribe();
    if network.is_none() {
        debug!("Network port has no change notifications; timer only");
    }
    let mut on_wifi = context.ports.network.sample().await.on_wifi();

    trigger(&context, Trigger::Startup);

    let period = context.config.check_interval();
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => trigger(&context, Trigger::Timer),
            change = next_network_change(&mut network) => {
                let Some(state) = change else {
                    debug!("Network notifications ended");
                    network = None;
                    continue;
                };
                let now_on_wifi = state.on_wifi();
                if now_on_wifi && !on_wifi && context.config.force_update_on_wifi {
                    trigger(&context, Trigger::WifiConnected);
                }
                on_wifi = now_on_wifi;
            }
        }
    }

    info!("Update scheduler stopped");
}

async fn next_network_change(
    receiver: &mut Option<watch::Receiver<NetworkState>>,
) -> Option<NetworkState> {
    match receiver {
        Some(receiver) => {
            receiver.changed().await.ok()?;
            Some(*receiver.borrow_and_update())
        }
        None => std::future::pending().await,
    }
}

fn trigger(context: &Arc<EngineContext>, reason: Trigger) {
    if context.is_active() {
        debug!("{reason:?} check skipped: a session is already running");
        return;
    }
    debug!("{reason:?} check");
    let context = Arc::clone(context);
    tokio::spawn(async move {
        session::run_guarded(&context).await;
    });
}
