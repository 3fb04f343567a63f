//! Wire protocol types for the StealthIM client SDK.
//!
//! Covers the file-transfer and live-event endpoints: the result envelope
//! every endpoint embeds, the upload metadata and ack messages, the
//! download sentinel payload and the server-sent event batches.

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::SUCCESS_CODE;
pub use envelope::{DomainError, ResultEnvelope};
pub use messages::{DownloadSentinel, EventBatch, FileInfoResponse, FileMetadata, UploadAck};
pub use types::{ChatMessage, MessageKind};
