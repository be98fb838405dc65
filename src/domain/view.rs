//! Read models returned by the messaging service: domain records joined with
//! profile data and with storage keys swapped for signed URLs.

use crate::domain::conversation::Conversation;
use crate::domain::message::Message;
use time::OffsetDateTime;
use uuid::Uuid;

pub const UNKNOWN_USER_NAME: &str = "Unknown User";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCard {
    pub user_id: String,
    pub full_name: String,
    pub profile_image_url: Option<String>,
    pub headline: Option<String>,
}

impl ProfileCard {
    #[must_use]
    pub fn unknown(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            full_name: UNKNOWN_USER_NAME.to_string(),
            profile_image_url: None,
            headline: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplyPreview {
    pub id: Uuid,
    pub content: String,
    pub sender_id: String,
    pub created_at: OffsetDateTime,
}

impl From<&Message> for ReplyPreview {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            content: message.content.clone(),
            sender_id: message.sender_id.clone(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageView {
    pub message: Message,
    pub sender: ProfileCard,
    pub media_url: Option<String>,
    pub reply: Option<ReplyPreview>,
}

#[derive(Debug, Clone)]
pub struct ConversationView {
    pub conversation: Conversation,
    /// Everyone in the conversation except the requesting user.
    pub participants: Vec<ProfileCard>,
    pub unread_count: i64,
}
