use crate::domain::conversation::{Conversation, ConversationType, LastMessage};
use crate::domain::message::MessageType;
use crate::error::{AppError, Result};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct ConversationRecord {
    pub(crate) id: Uuid,
    pub(crate) conversation_type: String,
    pub(crate) pair_key: Option<String>,
    pub(crate) created_by: String,
    pub(crate) is_active: bool,
    pub(crate) last_message_content: Option<String>,
    pub(crate) last_message_sender_id: Option<String>,
    pub(crate) last_message_at: Option<OffsetDateTime>,
    pub(crate) last_message_type: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ParticipantRecord {
    pub(crate) conversation_id: Uuid,
    pub(crate) user_id: String,
    pub(crate) unread_count: i64,
}

impl ConversationRecord {
    /// Joins the row with its participant rows, which must be ordered by position.
    pub(crate) fn into_domain(self, participants: Vec<ParticipantRecord>) -> Result<Conversation> {
        let conversation_type = self
            .conversation_type
            .parse::<ConversationType>()
            .map_err(|e| AppError::InternalMsg(format!("Corrupt conversation {}: {e}", self.id)))?;

        let last_message = match (self.last_message_content, self.last_message_sender_id, self.last_message_at) {
            (Some(content), Some(sender_id), Some(timestamp)) => {
                let message_type = match self.last_message_type.as_deref() {
                    Some(raw) => raw.parse::<MessageType>().map_err(|_| {
                        AppError::InternalMsg(format!("Corrupt last message type on conversation {}", self.id))
                    })?,
                    None => MessageType::Text,
                };
                Some(LastMessage { content, sender_id, timestamp, message_type })
            }
            _ => None,
        };

        let unread_counts = participants.iter().map(|p| (p.user_id.clone(), p.unread_count)).collect();

        Ok(Conversation {
            id: self.id,
            conversation_type,
            participants: participants.into_iter().map(|p| p.user_id).collect(),
            pair_key: self.pair_key,
            last_message,
            unread_counts,
            is_active: self.is_active,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
