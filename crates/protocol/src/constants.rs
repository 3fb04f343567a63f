use std::time::Duration;

/// Result code carried by every successful envelope.
pub const SUCCESS_CODE: i32 = 800;

/// Size of one upload / hashing block (2048 KiB).
pub const BLOCK_SIZE: usize = 2048 * 1024;

/// Reserved block id that terminates a streamable download.
pub const SENTINEL_BLOCK_ID: u32 = 0xFFFF_FFFF;

/// Length of the `[block id][length]` header preceding each download frame.
pub const DOWNLOAD_FRAME_HEADER_LEN: usize = 8;

/// Length of the block id prefix on an upload frame.
pub const UPLOAD_FRAME_HEADER_LEN: usize = 4;

/// Upper bound accepted for a single download frame payload (64 MiB).
///
/// Frames claiming more than this are treated as corrupt rather than
/// allocated.
pub const MAX_DOWNLOAD_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Duplex endpoint for chunked uploads.
pub const UPLOAD_PATH: &str = "/api/v1/file/";

/// Prefix of the download and file-info endpoints (`{prefix}{hash}`).
pub const FILE_PATH_PREFIX: &str = "/api/v1/file/";

/// Prefix of the live-event endpoint (`{prefix}{group_id}`).
pub const MESSAGE_PATH_PREFIX: &str = "/api/v1/message/";

/// Query parameter carrying the session on duplex connections.
pub const AUTH_QUERY_PARAM: &str = "authorization";

/// Query parameter carrying the live-event resumption cursor.
pub const CURSOR_QUERY_PARAM: &str = "msgid";

/// Content type requested from the live-event endpoint.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Client identity sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("StealthIM-RustSDK/", env!("CARGO_PKG_VERSION"));

/// Timeout for ordinary request/response calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the duplex handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for the server to acknowledge one upload message.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection attempts made by the live-event consumer before giving up.
pub const STREAM_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between live-event connection attempts.
pub const STREAM_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Returns the download / file-info path for a content hash.
pub fn file_path(hash: &str) -> String {
    format!("{FILE_PATH_PREFIX}{hash}")
}

/// Returns the live-event path for a group.
pub fn message_path(group_id: i64) -> String {
    format!("{MESSAGE_PATH_PREFIX}{group_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_paths() {
        assert_eq!(file_path("abcd"), "/api/v1/file/abcd");
        assert_eq!(message_path(42), "/api/v1/message/42");
    }

    #[test]
    fn user_agent_names_sdk() {
        assert!(DEFAULT_USER_AGENT.starts_with("StealthIM-RustSDK/"));
    }
}
