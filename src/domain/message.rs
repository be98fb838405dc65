use crate::domain::conversation::LastMessage;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    System,
}

impl MessageType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            "system" => Ok(Self::System),
            other => Err(AppError::BadRequest(format!("Unsupported message type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub user_id: String,
    pub emoji: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub media_key: Option<String>,
    pub media_file_name: Option<String>,
    pub is_read: bool,
    pub read_at: Option<OffsetDateTime>,
    pub is_edited: bool,
    pub edited_at: Option<OffsetDateTime>,
    pub is_deleted: bool,
    pub deleted_at: Option<OffsetDateTime>,
    pub reply_to: Option<Uuid>,
    pub reactions: Vec<Reaction>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn snapshot(&self) -> LastMessage {
        LastMessage {
            content: self.content.clone(),
            sender_id: self.sender_id.clone(),
            timestamp: self.created_at,
            message_type: self.message_type,
        }
    }

    /// Whether this message still counts towards `user_id`'s unread counter.
    #[must_use]
    pub fn is_unread_for(&self, user_id: &str) -> bool {
        self.receiver_id == user_id && !self.is_read && !self.is_deleted
    }
}

/// A message about to be appended to a conversation's log.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub media_key: Option<String>,
    pub media_file_name: Option<String>,
    pub reply_to: Option<Uuid>,
}

impl NewMessage {
    #[must_use]
    pub fn into_message(self, created_at: OffsetDateTime) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            message_type: self.message_type,
            media_key: self.media_key,
            media_file_name: self.media_file_name,
            is_read: false,
            read_at: None,
            is_edited: false,
            edited_at: None,
            is_deleted: false,
            deleted_at: None,
            reply_to: self.reply_to,
            reactions: Vec::new(),
            created_at,
            updated_at: created_at,
        }
    }
}

/// A send request as accepted from the API layer, before validation.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub message_type: MessageType,
    pub media_key: Option<String>,
    pub media_file_name: Option<String>,
    pub reply_to: Option<Uuid>,
}

/// Trims message content and enforces the length bounds.
///
/// # Errors
/// Returns `AppError::BadRequest` if the content is blank or longer than `max_len` characters.
pub fn normalize_content(raw: &str, max_len: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Message content is required".to_string()));
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::BadRequest(format!("Message content exceeds {max_len} characters")));
    }
    Ok(trimmed.to_string())
}

/// Validates a required identifier field.
///
/// # Errors
/// Returns `AppError::BadRequest` naming `field` if the value is blank.
pub fn require_id<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed)
}
