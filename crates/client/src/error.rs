//! Error types for the client SDK.

use stealthim_protocol::DomainError;
use stealthim_transfer::TransferError;
use tokio_tungstenite::tungstenite;

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect failure, timeout, I/O failure or unexpected HTTP status.
    Transport,
    /// Malformed frame, missing or duplicate block, sentinel out of place.
    Protocol,
    /// The server answered with a non-success result envelope.
    Domain,
    /// The caller cancelled the operation.
    Cancelled,
}

/// Errors produced by the client SDK.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("metadata rejected: {0}")]
    MetadataRejected(DomainError),

    #[error("block {block_id} rejected: {error}")]
    BlockRejected { block_id: u32, error: DomainError },

    #[error("upload finalize failed: {0}")]
    FinalizeRejected(Box<ClientError>),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("task failed: {0}")]
    Task(String),

    #[error("cancelled")]
    Cancelled,
}

impl ClientError {
    /// Maps the error onto the transport / protocol / domain / cancelled taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Http(_)
            | ClientError::Ws(_)
            | ClientError::Io(_)
            | ClientError::Connect(_)
            | ClientError::Status(_)
            | ClientError::Timeout(_)
            | ClientError::Closed(_)
            | ClientError::Config(_)
            | ClientError::Task(_) => ErrorKind::Transport,
            ClientError::Protocol(_) | ClientError::Json(_) => ErrorKind::Protocol,
            ClientError::Transfer(e) => {
                if e.is_protocol() {
                    ErrorKind::Protocol
                } else {
                    ErrorKind::Transport
                }
            }
            ClientError::Domain(_)
            | ClientError::MetadataRejected(_)
            | ClientError::BlockRejected { .. } => ErrorKind::Domain,
            ClientError::FinalizeRejected(inner) => inner.kind(),
            ClientError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The server-supplied envelope, for domain errors.
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            ClientError::Domain(e)
            | ClientError::MetadataRejected(e)
            | ClientError::BlockRejected { error: e, .. } => Some(e),
            ClientError::FinalizeRejected(inner) => inner.domain_error(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
