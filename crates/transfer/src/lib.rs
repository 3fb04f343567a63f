//! File-transfer building blocks: content hashing, block reading,
//! binary framing and out-of-order reassembly.
//!
//! Nothing in this crate touches the network; the client crate drives
//! these pieces over its transports.

mod chunked;
pub mod frame;
mod hasher;
mod progress;
mod reassembly;
mod types;

pub use chunked::BlockReader;
pub use hasher::{ContentHasher, HashAlgorithm, block_count, hash_bytes, hash_file, hash_reader};
pub use progress::{SpeedCalculator, UploadProgress};
pub use reassembly::ReassemblyBuffer;
pub use types::Block;

pub use stealthim_protocol::constants::{BLOCK_SIZE, SENTINEL_BLOCK_ID};

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated frame: {0}")]
    TruncatedFrame(String),

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("duplicate block {0}")]
    DuplicateBlock(u32),

    #[error("missing block {missing} (max block id {max_id})")]
    MissingBlock { missing: u32, max_id: u32 },

    #[error("block id {0:#x} is reserved")]
    ReservedBlockId(u32),
}

impl TransferError {
    /// Returns `true` for wire-format and reassembly violations, as opposed
    /// to local or transport I/O failures.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, TransferError::Io(_))
    }
}
