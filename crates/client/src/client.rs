//! High-level entry point tying configuration, transport and components together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Method;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use stealthim_protocol::FileInfoResponse;
use stealthim_protocol::constants::file_path;
use stealthim_transfer::UploadProgress;

use crate::config::{ClientConfig, DEFAULT_PROGRESS_CHANNEL_CAPACITY};
use crate::download::{StreamableDownloader, validate_hash};
use crate::error::ClientError;
use crate::http::HttpTransport;
use crate::live::{EventSubscription, LiveEventConsumer, StreamCursor};
use crate::transport::AuthenticatedTransport;
use crate::upload::{ChunkedUploader, UploadReport, UploadRequest};

/// StealthIM file-transfer and live-event client.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    transport: Arc<dyn AuthenticatedTransport>,
}

impl Client {
    /// Creates a client backed by [`HttpTransport`].
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn AuthenticatedTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn uploader(&self, cancel: CancellationToken) -> ChunkedUploader<'_> {
        ChunkedUploader::new(
            self.transport.as_ref(),
            self.config.ack_timeout,
            self.config.closure.clone(),
            cancel,
        )
    }

    /// Uploads a file and waits for the server to confirm it.
    pub async fn upload_file(
        &self,
        request: &UploadRequest,
        cancel: CancellationToken,
    ) -> Result<UploadReport, ClientError> {
        self.uploader(cancel).upload(request).await
    }

    /// Runs an upload on its own task, reporting progress per block.
    pub fn spawn_upload(&self, request: UploadRequest) -> TransferHandle<UploadReport> {
        let (progress_tx, progress_rx) = mpsc::channel(DEFAULT_PROGRESS_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let client = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            client
                .uploader(task_cancel)
                .with_progress(progress_tx)
                .upload(&request)
                .await
        });
        TransferHandle {
            progress: Some(progress_rx),
            cancel,
            task,
        }
    }

    /// Downloads the file identified by `hash` to `output`.
    pub async fn download_file(
        &self,
        hash: &str,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<u64, ClientError> {
        StreamableDownloader::new(self.transport.as_ref(), cancel)
            .download(hash, output)
            .await
    }

    /// Runs a download on its own task.
    pub fn spawn_download(&self, hash: impl Into<String>, output: impl Into<PathBuf>) -> TransferHandle<u64> {
        let hash = hash.into();
        let output = output.into();
        let cancel = CancellationToken::new();
        let client = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            client.download_file(&hash, &output, task_cancel).await
        });
        TransferHandle {
            progress: None,
            cancel,
            task,
        }
    }

    /// Returns the stored size of the file identified by `hash`.
    pub async fn file_info(&self, hash: &str) -> Result<u64, ClientError> {
        validate_hash(hash)?;
        let path = file_path(hash);
        let resp = self.transport.issue_request(Method::POST, &path, None).await?;
        if !resp.is_success() {
            return Err(ClientError::Status(resp.status));
        }

        let info: FileInfoResponse = serde_json::from_slice(&resp.body)?;
        info.result.into_result()?;
        let size = info
            .size
            .trim()
            .parse::<u64>()
            .map_err(|_| ClientError::Protocol(format!("invalid file size {:?}", info.size)))?;
        debug!(hash, size, "file info");
        Ok(size)
    }

    /// Starts consuming the live message stream of `group_id`.
    pub fn receive_messages(&self, group_id: i64, cursor: StreamCursor) -> EventSubscription {
        LiveEventConsumer::new(self.transport.clone(), self.config.stream.clone()).subscribe(
            group_id,
            cursor,
            CancellationToken::new(),
        )
    }
}

/// Handle to a transfer running on its own task.
pub struct TransferHandle<T> {
    /// Per-block upload progress; `None` for downloads.
    pub progress: Option<mpsc::Receiver<UploadProgress>>,
    cancel: CancellationToken,
    task: JoinHandle<Result<T, ClientError>>,
}

impl<T> TransferHandle<T> {
    /// Aborts the transfer at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the transfer's terminal outcome.
    pub async fn join(self) -> Result<T, ClientError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(ClientError::Task(e.to_string())),
        }
    }
}
