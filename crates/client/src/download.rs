//! Streamable downloads: framed response bodies reassembled by block id.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stealthim_protocol::DownloadSentinel;
use stealthim_protocol::constants::file_path;
use stealthim_transfer::ReassemblyBuffer;
use stealthim_transfer::frame::{DownloadFrame, read_download_frame};

use crate::error::ClientError;
use crate::guard::cancellable;
use crate::transport::{AuthenticatedTransport, StreamRequest};

/// Write buffer for the output file.
const OUTPUT_BUFFER_SIZE: usize = 256 * 1024;

/// An HTTP byte range, `end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Bytes `start..=end`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Everything from `start` on.
    pub fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Value of the `Range` request header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Rejects hashes that would escape the file endpoint path.
pub(crate) fn validate_hash(hash: &str) -> Result<(), ClientError> {
    if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ClientError::Config(format!("invalid file hash: {hash:?}")));
    }
    Ok(())
}

/// Returns `<output>.part`.
fn part_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Fetches framed downloads and reassembles them in block-id order.
pub struct StreamableDownloader<'a> {
    transport: &'a dyn AuthenticatedTransport,
    cancel: CancellationToken,
}

impl<'a> StreamableDownloader<'a> {
    pub fn new(transport: &'a dyn AuthenticatedTransport, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }

    /// Reads one framed response up to its sentinel and returns the blocks.
    ///
    /// The buffer is returned only when the sentinel carries a success
    /// envelope; completeness is checked when the buffer is written out,
    /// so buffers from disjoint ranges can be merged first.
    pub async fn fetch_blocks(
        &self,
        hash: &str,
        range: Option<ByteRange>,
    ) -> Result<ReassemblyBuffer, ClientError> {
        validate_hash(hash)?;

        let mut request = StreamRequest::new(file_path(hash));
        if let Some(range) = range {
            request = request.header("Range", range.header_value());
        }

        let response = cancellable(&self.cancel, self.transport.open_stream(request)).await?;
        if !response.is_success() {
            return Err(ClientError::Status(response.status));
        }
        let mut body = response.body;

        let mut buffer = ReassemblyBuffer::new();
        loop {
            let frame = cancellable(&self.cancel, async {
                Ok::<_, ClientError>(read_download_frame(&mut body).await?)
            })
            .await?;

            match frame {
                Some(DownloadFrame::Block(block)) => {
                    debug!(block_id = block.id, bytes = block.payload.len(), "block received");
                    buffer.insert_block(block)?;
                }
                Some(DownloadFrame::Sentinel(payload)) => {
                    let sentinel: DownloadSentinel = serde_json::from_slice(&payload)?;
                    sentinel.result.into_result()?;
                    debug!(
                        hash,
                        blocks = buffer.len(),
                        bytes = buffer.total_bytes(),
                        "download sentinel received"
                    );
                    return Ok(buffer);
                }
                None => {
                    return Err(ClientError::Protocol(format!(
                        "stream ended after {} blocks without a terminal frame",
                        buffer.len()
                    )));
                }
            }
        }
    }

    /// Downloads `hash` and writes the reassembled bytes to `writer`.
    ///
    /// Nothing is written unless the transfer completes and every block
    /// is present. Returns the number of bytes written.
    pub async fn download_to_writer<W: AsyncWrite + Unpin>(
        &self,
        hash: &str,
        writer: &mut W,
    ) -> Result<u64, ClientError> {
        let buffer = self.fetch_blocks(hash, None).await?;
        Ok(buffer.write_to(writer).await?)
    }

    /// Downloads `hash` to `output`.
    ///
    /// Bytes go to `<output>.part` first, which replaces `output` only
    /// after every block is flushed and is removed on failure.
    pub async fn download(&self, hash: &str, output: &Path) -> Result<u64, ClientError> {
        let buffer = self.fetch_blocks(hash, None).await?;
        buffer.verify()?;

        let part = part_path(output);
        let persisted = async {
            let written = write_part(buffer, &part).await?;
            tokio::fs::rename(&part, output).await?;
            Ok::<_, ClientError>(written)
        }
        .await;
        match persisted {
            Ok(written) => {
                info!(hash, path = %output.display(), bytes = written, "download completed");
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    warn!(path = %part.display(), error = %rm, "failed to remove partial download");
                }
                Err(e)
            }
        }
    }
}

async fn write_part(buffer: ReassemblyBuffer, part: &Path) -> Result<u64, ClientError> {
    let file = tokio::fs::File::create(part).await?;
    let mut writer = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file);
    let written = buffer.write_to(&mut writer).await?;
    writer.into_inner().sync_all().await?;
    Ok(written)
}
