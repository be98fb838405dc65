use crate::domain::message::{Message, MessageType, Reaction};
use crate::error::{AppError, Result};
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: Uuid,
    pub(crate) conversation_id: Uuid,
    pub(crate) sender_id: String,
    pub(crate) receiver_id: String,
    pub(crate) content: String,
    pub(crate) message_type: String,
    pub(crate) media_key: Option<String>,
    pub(crate) media_file_name: Option<String>,
    pub(crate) is_read: bool,
    pub(crate) read_at: Option<OffsetDateTime>,
    pub(crate) is_edited: bool,
    pub(crate) edited_at: Option<OffsetDateTime>,
    pub(crate) is_deleted: bool,
    pub(crate) deleted_at: Option<OffsetDateTime>,
    pub(crate) reply_to: Option<Uuid>,
    pub(crate) reactions: Json<Vec<Reaction>>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl TryFrom<MessageRecord> for Message {
    type Error = AppError;

    fn try_from(record: MessageRecord) -> Result<Self> {
        let message_type = record
            .message_type
            .parse::<MessageType>()
            .map_err(|_| AppError::InternalMsg(format!("Corrupt message type on message {}", record.id)))?;

        Ok(Self {
            id: record.id,
            conversation_id: record.conversation_id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            content: record.content,
            message_type,
            media_key: record.media_key,
            media_file_name: record.media_file_name,
            is_read: record.is_read,
            read_at: record.read_at,
            is_edited: record.is_edited,
            edited_at: record.edited_at,
            is_deleted: record.is_deleted,
            deleted_at: record.deleted_at,
            reply_to: record.reply_to,
            reactions: record.reactions.0,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
