//! Chunked upload over a duplex connection.
//!
//! The session runs strictly single-flight:
//!
//! ```text
//! connect ─► metadata ─► ack ─► block 0 ─► ack ─► block 1 ─► ack ... ─► final message
//! ```
//!
//! Blocks carry no correlation id the server echoes reliably, so a block
//! is only sent once the previous one has been acknowledged. Completion is
//! implicit: after the last ack the server either sends a final envelope
//! or closes the connection, and the [`ClosurePolicy`] decides which
//! closures count as success.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use stealthim_protocol::constants::UPLOAD_PATH;
use stealthim_protocol::{FileMetadata, UploadAck};
use stealthim_transfer::frame::encode_upload_frame;
use stealthim_transfer::{BlockReader, SpeedCalculator, UploadProgress, hash_file};

use crate::closure::ClosurePolicy;
use crate::error::ClientError;
use crate::guard::{cancellable, cancellable_timeout};
use crate::transport::{AuthenticatedTransport, DuplexClose, DuplexEvent, DuplexStream};

/// Grace period for the close handshake after a completed upload.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// What to upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub group_id: i64,
    /// Name announced to the server; defaults to the file name of `path`.
    pub filename: Option<String>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>, group_id: i64) -> Self {
        Self {
            path: path.into(),
            group_id,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    fn announced_name(&self) -> String {
        self.filename.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Upload session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Connecting,
    MetadataSent,
    Uploading { block_id: u32 },
    Completed,
    Failed(String),
}

/// How the server signalled completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalization {
    /// A success envelope after the last block ack.
    Envelope,
    /// A closure accepted by the [`ClosurePolicy`].
    Closure(DuplexClose),
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub hash: String,
    pub size: u64,
    pub blocks: u32,
    pub finalized_by: Finalization,
}

/// Drives one file through the chunked-upload protocol.
pub struct ChunkedUploader<'a> {
    transport: &'a dyn AuthenticatedTransport,
    ack_timeout: Duration,
    closure: ClosurePolicy,
    cancel: CancellationToken,
    progress: Option<mpsc::Sender<UploadProgress>>,
    state: UploadState,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(
        transport: &'a dyn AuthenticatedTransport,
        ack_timeout: Duration,
        closure: ClosurePolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            ack_timeout,
            closure,
            cancel,
            progress: None,
            state: UploadState::Connecting,
        }
    }

    /// Reports progress after every acknowledged block. Updates are
    /// dropped when the receiver lags; the upload never waits on them.
    pub fn with_progress(mut self, progress: mpsc::Sender<UploadProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Last state reached by [`upload`](Self::upload).
    pub fn state(&self) -> &UploadState {
        &self.state
    }

    fn transition(&mut self, next: UploadState) {
        trace!(from = ?self.state, to = ?next, "upload state");
        self.state = next;
    }

    /// Uploads `request.path` and returns once the server confirms it.
    pub async fn upload(&mut self, request: &UploadRequest) -> Result<UploadReport, ClientError> {
        self.state = UploadState::Connecting;
        let result = self.run(request).await;
        match &result {
            Ok(report) => {
                info!(hash = %report.hash, size = report.size, blocks = report.blocks, "upload completed");
                self.transition(UploadState::Completed);
            }
            Err(e) => {
                warn!(path = %request.path.display(), error = %e, "upload failed");
                self.transition(UploadState::Failed(e.to_string()));
            }
        }
        result
    }

    async fn run(&mut self, request: &UploadRequest) -> Result<UploadReport, ClientError> {
        let file = tokio::fs::File::open(&request.path).await?;
        let size = file.metadata().await?.len();
        let hash = self.hash(&request.path).await?;
        debug!(path = %request.path.display(), size, %hash, "file hashed");

        let mut duplex = match cancellable(&self.cancel, self.transport.open_duplex(UPLOAD_PATH)).await {
            Ok(duplex) => duplex,
            Err(e @ (ClientError::Cancelled | ClientError::Connect(_))) => return Err(e),
            Err(e) => return Err(ClientError::Connect(e.to_string())),
        };

        let metadata = FileMetadata {
            size,
            group_id: request.group_id,
            hash: hash.clone(),
            filename: request.announced_name(),
        };
        let text = serde_json::to_string(&metadata)?;
        cancellable(&self.cancel, duplex.send_text(text)).await?;
        self.transition(UploadState::MetadataSent);

        let ack = self.read_ack(duplex.as_mut(), "metadata ack").await?;
        ack.result
            .into_result()
            .map_err(ClientError::MetadataRejected)?;

        let mut reader = BlockReader::new(file);
        let mut speed = SpeedCalculator::default();
        speed.add_sample(0);
        let mut bytes_sent = 0u64;
        let mut blocks = 0u32;

        while let Some((block_id, payload)) = reader.next_block().await? {
            let len = payload.len() as u64;
            let frame = encode_upload_frame(block_id, payload);
            self.transition(UploadState::Uploading { block_id });

            cancellable(&self.cancel, duplex.send_binary(frame)).await?;
            let ack = self.read_ack(duplex.as_mut(), "block ack").await?;
            ack.result
                .into_result()
                .map_err(|error| ClientError::BlockRejected { block_id, error })?;
            if let Some(acked) = ack.block_id
                && acked != i64::from(block_id)
            {
                warn!(block_id, acked, "ack carries a different block id");
            }

            bytes_sent += len;
            blocks += 1;
            speed.add_sample(len);
            debug!(block_id, bytes = len, bytes_sent, "block acknowledged");
            self.report_progress(UploadProgress {
                block_id,
                bytes_sent,
                total_bytes: size,
                bytes_per_second: speed.bytes_per_second(),
            });
        }

        let finalized_by = self.finalize(duplex.as_mut()).await?;
        if finalized_by == Finalization::Envelope {
            let _ = tokio::time::timeout(CLOSE_GRACE, duplex.close()).await;
        }

        Ok(UploadReport {
            hash,
            size,
            blocks,
            finalized_by,
        })
    }

    async fn hash(&self, path: &Path) -> Result<String, ClientError> {
        let path = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || hash_file(&path));
        let joined = cancellable(&self.cancel, async {
            task.await.map_err(|e| ClientError::Task(e.to_string()))
        })
        .await?;
        Ok(joined?)
    }

    async fn read_ack(
        &self,
        duplex: &mut dyn DuplexStream,
        waiting_for: &'static str,
    ) -> Result<UploadAck, ClientError> {
        let event = cancellable_timeout(&self.cancel, self.ack_timeout, waiting_for, duplex.recv()).await?;
        match event {
            DuplexEvent::Text(text) => Ok(serde_json::from_str(&text)?),
            DuplexEvent::Binary(data) => Ok(serde_json::from_slice(&data)?),
            DuplexEvent::Closed(close) => Err(ClientError::Closed(format!(
                "{close} while waiting for {waiting_for}"
            ))),
        }
    }

    /// Reads the message following the last block ack.
    async fn finalize(&self, duplex: &mut dyn DuplexStream) -> Result<Finalization, ClientError> {
        let event = cancellable_timeout(&self.cancel, self.ack_timeout, "upload result", duplex.recv()).await;
        let event = match event {
            Ok(event) => event,
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => return Err(ClientError::FinalizeRejected(Box::new(e))),
        };

        let ack: UploadAck = match event {
            DuplexEvent::Text(text) => serde_json::from_str(&text),
            DuplexEvent::Binary(data) => serde_json::from_slice(&data),
            DuplexEvent::Closed(close) => {
                if self.closure.accepts(&close) {
                    debug!(%close, "closure accepted as upload completion");
                    return Ok(Finalization::Closure(close));
                }
                return Err(ClientError::FinalizeRejected(Box::new(ClientError::Closed(
                    close.to_string(),
                ))));
            }
        }
        .map_err(|e| ClientError::FinalizeRejected(Box::new(e.into())))?;

        ack.result
            .into_result()
            .map_err(|e| ClientError::FinalizeRejected(Box::new(e.into())))?;
        Ok(Finalization::Envelope)
    }

    fn report_progress(&self, update: UploadProgress) {
        if let Some(tx) = &self.progress
            && tx.try_send(update).is_err()
        {
            trace!("progress receiver lagging, update dropped");
        }
    }
}
