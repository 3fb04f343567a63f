use std::collections::BTreeMap;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::types::Block;
use crate::{SENTINEL_BLOCK_ID, TransferError};

/// Collects download blocks in any arrival order and releases them in
/// block-id order once the set is known to be complete.
///
/// A buffer is owned by a single download. Buffers filled by separate
/// connections over disjoint id ranges are combined with
/// [`merge`](Self::merge).
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    blocks: BTreeMap<u32, Vec<u8>>,
    total_bytes: u64,
}

impl ReassemblyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a block. A repeated id is a protocol violation.
    pub fn insert(&mut self, block_id: u32, payload: Vec<u8>) -> Result<(), TransferError> {
        if block_id == SENTINEL_BLOCK_ID {
            return Err(TransferError::ReservedBlockId(block_id));
        }
        if self.blocks.contains_key(&block_id) {
            return Err(TransferError::DuplicateBlock(block_id));
        }
        self.total_bytes += payload.len() as u64;
        self.blocks.insert(block_id, payload);
        Ok(())
    }

    pub fn insert_block(&mut self, block: Block) -> Result<(), TransferError> {
        self.insert(block.id, block.payload)
    }

    /// Moves every block of `other` into `self`; the id sets must be disjoint.
    pub fn merge(&mut self, other: ReassemblyBuffer) -> Result<(), TransferError> {
        if let Some(dup) = other.blocks.keys().find(|id| self.blocks.contains_key(id)) {
            return Err(TransferError::DuplicateBlock(*dup));
        }
        self.total_bytes += other.total_bytes;
        self.blocks.extend(other.blocks);
        Ok(())
    }

    /// Number of buffered blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of buffered payload sizes.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Greatest buffered block id.
    pub fn max_id(&self) -> Option<u32> {
        self.blocks.keys().next_back().copied()
    }

    /// Checks that every id in `0..=max_id` is present.
    pub fn verify(&self) -> Result<(), TransferError> {
        let Some(max_id) = self.max_id() else {
            return Ok(());
        };
        // Keys are sorted and unique, so the set is complete iff the i-th
        // key is i for every i.
        if let Some(missing) = self
            .blocks
            .keys()
            .zip(0u32..)
            .find_map(|(id, expected)| (*id != expected).then_some(expected))
        {
            return Err(TransferError::MissingBlock { missing, max_id });
        }
        Ok(())
    }

    /// Consumes the buffer and returns the payloads in block-id order.
    pub fn into_ordered(self) -> Result<Vec<Vec<u8>>, TransferError> {
        self.verify()?;
        Ok(self.blocks.into_values().collect())
    }

    /// Verifies completeness, then writes every block to `writer` in id order.
    ///
    /// Nothing is written if a block is missing. Returns the bytes written.
    pub async fn write_to<W: AsyncWrite + Unpin>(self, writer: &mut W) -> Result<u64, TransferError> {
        self.verify()?;
        let blocks = self.blocks.len();
        let mut written = 0u64;
        for payload in self.blocks.into_values() {
            writer.write_all(&payload).await?;
            written += payload.len() as u64;
        }
        writer.flush().await?;
        debug!(blocks, bytes = written, "reassembled blocks flushed");
        Ok(written)
    }
}
