use serde::{Deserialize, Serialize};

use crate::envelope::ResultEnvelope;
use crate::types::ChatMessage;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// First message of a chunked upload.
///
/// `size` and `groupid` travel as decimal strings so huge files survive
/// JSON number handling on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(with = "decimal_string")]
    pub size: u64,
    #[serde(rename = "groupid", with = "decimal_string")]
    pub group_id: i64,
    pub hash: String,
    pub filename: String,
}

/// Acknowledgement for the metadata message, a block, or the final outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAck {
    pub result: ResultEnvelope,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "blockid", default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Payload of the terminal `0xFFFFFFFF` download frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSentinel {
    pub result: ResultEnvelope,
}

/// Response to a file-info request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfoResponse {
    pub result: ResultEnvelope,
    /// File size as a decimal string (empty on failure).
    #[serde(default)]
    pub size: String,
}

// ---------------------------------------------------------------------------
// Live events
// ---------------------------------------------------------------------------

/// Payload of one `data: ` line on the live-event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub result: ResultEnvelope,
    #[serde(default)]
    pub msg: Vec<ChatMessage>,
}

/// Serializes integers as decimal strings, accepting either form on input.
mod decimal_string {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        };
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}
