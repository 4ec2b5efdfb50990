use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info};
use ota_ports::{DownloadOutcome, DownloadProgress, FileStat, PortError, TransferPort};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

const WRITE_PROBE_NAME: &str = ".test_write";

/// Streaming HTTP downloads into the local artifact cache.
#[derive(Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn io_with_path(path: &Path, error: &std::io::Error) -> PortError {
    PortError::Io {
        kind: error.kind(),
        message: format!("{}: {error}", path.display()),
    }
}

#[async_trait]
impl TransferPort for HttpTransfer {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: mpsc::Sender<DownloadProgress>,
    ) -> Result<DownloadOutcome, PortError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| PortError::http_request_from("download", error))?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            info!("Download of {url} answered HTTP {status_code}");
            return Ok(DownloadOutcome {
                status_code,
                bytes_written: 0,
            });
        }

        let total_bytes = response.content_length();
        let mut bytes_received: u64 = 0;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|error| io_with_path(dest, &error))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|error| PortError::http_request_from("download stream", error))?;
            file.write_all(&chunk)
                .await
                .map_err(|error| io_with_path(dest, &error))?;
            bytes_received += chunk.len() as u64;
            let _ = progress
                .send(DownloadProgress {
                    bytes_received,
                    total_bytes,
                })
                .await;
        }

        file.flush()
            .await
            .map_err(|error| io_with_path(dest, &error))?;

        info!("Download complete: {bytes_received} bytes");
        Ok(DownloadOutcome {
            status_code,
            bytes_written: bytes_received,
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool, PortError> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|error| io_with_path(path, &error))
    }

    async fn remove(&self, path: &Path) -> Result<(), PortError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_with_path(path, &error)),
        }
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, PortError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|error| io_with_path(path, &error))?;
        Ok(FileStat {
            size: metadata.len(),
        })
    }

    async fn ensure_writable(&self, dir: &Path) -> Result<(), PortError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|error| io_with_path(dir, &error))?;

        let probe = dir.join(WRITE_PROBE_NAME);
        tokio::fs::write(&probe, b"test")
            .await
            .map_err(|error| io_with_path(&probe, &error))?;
        if !self.exists(&probe).await? {
            return Err(PortError::platform(
                "write probe",
                format!("probe file was not created at {}", probe.display()),
            ));
        }
        self.remove(&probe).await?;
        debug!("Write access verified for {}", dir.display());
        Ok(())
    }
}
