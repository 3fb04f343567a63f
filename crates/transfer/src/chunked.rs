use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{BLOCK_SIZE, TransferError};

/// Reads a source in fixed-size blocks tagged with consecutive ids.
///
/// Ids start at 0 and increase by one per block with no gaps. Every block
/// except the last is exactly `block_size` bytes; an empty source yields
/// no blocks at all. The read buffer is owned by the reader and reused for
/// every block, so peak memory stays at one block regardless of file size.
pub struct BlockReader<R> {
    source: R,
    buf: Vec<u8>,
    next_id: u32,
    offset: u64,
    done: bool,
}

impl<R: AsyncRead + Unpin> BlockReader<R> {
    /// Wraps `source` using the protocol's [`BLOCK_SIZE`].
    pub fn new(source: R) -> Self {
        Self::with_block_size(source, BLOCK_SIZE)
    }

    /// Wraps `source` with a custom block size.
    ///
    /// If `block_size` is 0, [`BLOCK_SIZE`] is used.
    pub fn with_block_size(source: R, block_size: usize) -> Self {
        let block_size = if block_size == 0 {
            BLOCK_SIZE
        } else {
            block_size
        };
        Self {
            source,
            buf: vec![0u8; block_size],
            next_id: 0,
            offset: 0,
            done: false,
        }
    }

    /// Reads the next block. Returns `None` at EOF.
    ///
    /// The returned slice borrows the internal buffer and is only valid
    /// until the next call.
    pub async fn next_block(&mut self) -> Result<Option<(u32, &[u8])>, TransferError> {
        if self.done {
            return Ok(None);
        }

        // Fill the whole buffer unless the source ends first; short reads
        // from the source must not produce short blocks mid-stream.
        let mut filled = 0;
        while filled < self.buf.len() {
            let n = self.source.read(&mut self.buf[filled..]).await?;
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        let id = self.next_id;
        self.next_id = self
            .next_id
            .checked_add(1)
            .filter(|next| *next != crate::SENTINEL_BLOCK_ID)
            .ok_or(TransferError::ReservedBlockId(crate::SENTINEL_BLOCK_ID))?;
        self.offset += filled as u64;
        Ok(Some((id, &self.buf[..filled])))
    }

    /// Id the next block will carry.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Source that hands out at most `step` bytes per read.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let end = (self.pos + self.step)
                .min(self.data.len())
                .min(self.pos + buf.remaining());
            let chunk = self.data[self.pos..end].to_vec();
            buf.put_slice(&chunk);
            self.pos = end;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn reads_sequential_ids() {
        let data = b"AABBCCDDEE";
        let mut reader = BlockReader::with_block_size(&data[..], 4);

        let (id, block) = reader.next_block().await.unwrap().unwrap();
        assert_eq!((id, block), (0, &b"AABB"[..]));
        let (id, block) = reader.next_block().await.unwrap().unwrap();
        assert_eq!((id, block), (1, &b"CCDD"[..]));
        let (id, block) = reader.next_block().await.unwrap().unwrap();
        assert_eq!((id, block), (2, &b"EE"[..]));

        assert!(reader.next_block().await.unwrap().is_none());
        assert_eq!(reader.offset(), 10);
        assert_eq!(reader.next_id(), 3);
    }

    #[tokio::test]
    async fn empty_source_yields_nothing() {
        let mut reader = BlockReader::with_block_size(&b""[..], 4);
        assert!(reader.next_block().await.unwrap().is_none());
        assert_eq!(reader.next_id(), 0);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_empty_tail() {
        let data = [7u8; 8];
        let mut reader = BlockReader::with_block_size(&data[..], 4);
        let mut ids = Vec::new();
        while let Some((id, block)) = reader.next_block().await.unwrap() {
            assert_eq!(block.len(), 4);
            ids.push(id);
        }
        assert_eq!(ids, [0, 1]);
    }

    #[tokio::test]
    async fn short_reads_still_fill_blocks() {
        let source = Trickle {
            data: (0..100u8).collect(),
            pos: 0,
            step: 3,
        };
        let mut reader = BlockReader::with_block_size(source, 32);
        let mut sizes = Vec::new();
        let mut all = Vec::new();
        while let Some((_, block)) = reader.next_block().await.unwrap() {
            sizes.push(block.len());
            all.extend_from_slice(block);
        }
        assert_eq!(sizes, [32, 32, 32, 4]);
        assert_eq!(all, (0..100u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn default_block_size_is_protocol_block() {
        let data = vec![1u8; BLOCK_SIZE + 1];
        let mut reader = BlockReader::new(&data[..]);
        let (_, first) = reader.next_block().await.unwrap().unwrap();
        assert_eq!(first.len(), BLOCK_SIZE);
        let (_, second) = reader.next_block().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
    }
}
