use serde::{Deserialize, Serialize};

/// Kind of a chat message, as carried in its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum MessageKind {
    Text,
    Image,
    LargeEmoji,
    Emoji,
    File,
    Card,
    InnerLink,
    RecallText,
    /// A code this SDK does not know about; preserved as-is.
    Unknown(i32),
}

impl From<i32> for MessageKind {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Text,
            1 => Self::Image,
            2 => Self::LargeEmoji,
            3 => Self::Emoji,
            4 => Self::File,
            5 => Self::Card,
            6 => Self::InnerLink,
            16 => Self::RecallText,
            other => Self::Unknown(other),
        }
    }
}

impl From<MessageKind> for i32 {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Text => 0,
            MessageKind::Image => 1,
            MessageKind::LargeEmoji => 2,
            MessageKind::Emoji => 3,
            MessageKind::File => 4,
            MessageKind::Card => 5,
            MessageKind::InnerLink => 6,
            MessageKind::RecallText => 16,
            MessageKind::Unknown(code) => code,
        }
    }
}

/// A message delivered by the live-event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "groupid")]
    pub group_id: String,
    pub msg: String,
    #[serde(rename = "msgid")]
    pub msg_id: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub username: String,
    /// Content hash for file messages.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}
