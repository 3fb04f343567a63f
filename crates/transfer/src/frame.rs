//! Binary frame codecs for uploads and streamable downloads.
//!
//! # Wire format
//!
//! ```text
//! UPLOAD (client -> server), one binary duplex message per block:
//!   [4 bytes LE: block id][block bytes]
//!
//! DOWNLOAD (server -> client), concatenated in the response body:
//!   [4 bytes LE: block id][4 bytes LE: length][length bytes: payload]
//!
//! SENTINEL: a download frame with block id 0xFFFFFFFF whose payload is
//!   the JSON {"result": {"code": .., "msg": ..}} closing the transfer.
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use stealthim_protocol::constants::{
    DOWNLOAD_FRAME_HEADER_LEN, MAX_DOWNLOAD_FRAME_LEN, SENTINEL_BLOCK_ID, UPLOAD_FRAME_HEADER_LEN,
};

use crate::TransferError;
use crate::types::Block;

/// Builds an upload frame: the block id followed by the raw block bytes.
pub fn encode_upload_frame(block_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(UPLOAD_FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&block_id.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Splits an upload frame into its block id and payload.
pub fn decode_upload_frame(frame: &[u8]) -> Result<(u32, &[u8]), TransferError> {
    if frame.len() < UPLOAD_FRAME_HEADER_LEN {
        return Err(TransferError::TruncatedFrame(format!(
            "upload frame of {} bytes has no block id",
            frame.len()
        )));
    }
    let (id, payload) = frame.split_at(UPLOAD_FRAME_HEADER_LEN);
    let id = u32::from_le_bytes([id[0], id[1], id[2], id[3]]);
    Ok((id, payload))
}

/// One decoded download frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadFrame {
    /// A data block.
    Block(Block),
    /// The terminal frame and its JSON payload.
    Sentinel(Vec<u8>),
}

/// Reads one download frame.
///
/// Returns `None` when the stream ends cleanly on a frame boundary; an
/// end of stream inside a header or payload is a [`TransferError::TruncatedFrame`].
pub async fn read_download_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<DownloadFrame>, TransferError> {
    let mut header = [0u8; DOWNLOAD_FRAME_HEADER_LEN];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransferError::TruncatedFrame(format!(
                "stream ended after {filled} of {DOWNLOAD_FRAME_HEADER_LEN} header bytes"
            )));
        }
        filled += n;
    }

    let block_id = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_DOWNLOAD_FRAME_LEN {
        return Err(TransferError::FrameTooLarge {
            len,
            max: MAX_DOWNLOAD_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len as usize];
    if let Err(e) = reader.read_exact(&mut payload).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(TransferError::TruncatedFrame(format!(
                "stream ended inside the {len}-byte payload of block {block_id:#x}"
            )));
        }
        return Err(e.into());
    }

    if block_id == SENTINEL_BLOCK_ID {
        Ok(Some(DownloadFrame::Sentinel(payload)))
    } else {
        Ok(Some(DownloadFrame::Block(Block::new(block_id, payload))))
    }
}

/// Writes one download frame. Used by servers and test fixtures.
pub async fn write_download_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    block_id: u32,
    payload: &[u8],
) -> Result<(), TransferError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_DOWNLOAD_FRAME_LEN)
        .ok_or(TransferError::FrameTooLarge {
            len: u32::MAX,
            max: MAX_DOWNLOAD_FRAME_LEN,
        })?;
    writer.write_all(&block_id.to_le_bytes()).await?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}
