use crate::domain::conversation::{Conversation, LastMessage};
use crate::domain::message::{MessageType, Reaction};
use crate::domain::pagination::Page;
use crate::domain::view::{ConversationView, MessageView, ProfileCard, ReplyPreview};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub content: Option<String>,
    pub message_type: Option<String>,
    /// Storage key of an uploaded attachment.
    pub media_url: Option<String>,
    pub media_file_name: Option<String>,
    pub reply_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActionRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub user_id: Option<String>,
    pub content: Option<String>,
}

/// Paging parameters are taken as raw strings; anything that is not a positive integer falls
/// back to the defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    #[must_use]
    pub fn page(&self) -> Option<u32> {
        lenient_u32(self.page.as_deref())
    }

    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        lenient_u32(self.limit.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub paging: PageQuery,
}

fn lenient_u32(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl PaginationDto {
    #[must_use]
    pub const fn new(page: Page, total: u64) -> Self {
        Self { page: page.number, limit: page.limit, total }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCardDto {
    pub user_id: String,
    pub full_name: String,
    pub profile_image: Option<String>,
    pub headline: Option<String>,
}

impl From<ProfileCard> for ProfileCardDto {
    fn from(card: ProfileCard) -> Self {
        Self {
            user_id: card.user_id,
            full_name: card.full_name,
            profile_image: card.profile_image_url,
            headline: card.headline,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreviewDto {
    pub id: Uuid,
    pub content: String,
    pub sender_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ReplyPreview> for ReplyPreviewDto {
    fn from(preview: ReplyPreview) -> Self {
        Self { id: preview.id, content: preview.content, sender_id: preview.sender_id, created_at: preview.created_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub message_type: MessageType,
    /// Signed, time-limited download URL.
    pub media_url: Option<String>,
    pub media_file_name: Option<String>,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub read_at: Option<OffsetDateTime>,
    pub is_edited: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub edited_at: Option<OffsetDateTime>,
    pub reply_to: Option<ReplyPreviewDto>,
    pub reactions: Vec<Reaction>,
    pub sender: ProfileCardDto,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MessageView> for MessageDto {
    fn from(view: MessageView) -> Self {
        let MessageView { message, sender, media_url, reply } = view;
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            message_type: message.message_type,
            media_url,
            media_file_name: message.media_file_name,
            is_read: message.is_read,
            read_at: message.read_at,
            is_edited: message.is_edited,
            edited_at: message.edited_at,
            reply_to: reply.map(Into::into),
            reactions: message.reactions,
            sender: sender.into(),
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageDto {
    pub content: String,
    pub sender_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub message_type: MessageType,
}

impl From<LastMessage> for LastMessageDto {
    fn from(last: LastMessage) -> Self {
        Self {
            content: last.content,
            sender_id: last.sender_id,
            timestamp: last.timestamp,
            message_type: last.message_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: Uuid,
    pub conversation_type: String,
    /// Profiles of everyone except the requesting user.
    pub participants: Vec<ProfileCardDto>,
    pub last_message: Option<LastMessageDto>,
    pub unread_count: i64,
    pub is_active: bool,
    pub created_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<ConversationView> for ConversationDto {
    fn from(view: ConversationView) -> Self {
        let ConversationView { conversation, participants, unread_count } = view;
        let Conversation { id, conversation_type, last_message, is_active, created_by, created_at, updated_at, .. } =
            conversation;
        Self {
            id,
            conversation_type: conversation_type.as_str().to_string(),
            participants: participants.into_iter().map(Into::into).collect(),
            last_message: last_message.map(Into::into),
            unread_count,
            is_active,
            created_by,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub message: String,
    pub data: MessageDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<ConversationDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageDto>,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub message: String,
    pub marked_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResponse {
    pub conversation_id: Uuid,
    pub unread_counts: BTreeMap<String, i64>,
}
