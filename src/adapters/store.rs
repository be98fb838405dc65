use crate::domain::conversation::{Conversation, LastMessage, NewDirectConversation, PairKey};
use crate::domain::message::{Message, NewMessage};
use crate::domain::pagination::Page;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Persisted conversation aggregates: participants, last-message snapshot and unread counters.
#[async_trait]
pub trait ConversationStore: Send + Sync + std::fmt::Debug {
    async fn find(&self, id: Uuid) -> Result<Option<Conversation>>;

    async fn find_direct(&self, pair_key: &PairKey) -> Result<Option<Conversation>>;

    /// Creates a direct conversation.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if a direct conversation already exists for the pair key.
    async fn insert_direct(&self, new: NewDirectConversation) -> Result<Conversation>;

    /// Active conversations of `user_id`, most recently messaged first, never-messaged last.
    async fn list_for_participant(&self, user_id: &str, page: Page) -> Result<Vec<Conversation>>;

    async fn count_for_participant(&self, user_id: &str) -> Result<u64>;

    /// Sets the last-message snapshot and increments the receiver's counter in one atomic step.
    ///
    /// Concurrent calls must never lose an increment; the snapshot only moves forward in time.
    async fn record_message(&self, conversation_id: Uuid, snapshot: &LastMessage, receiver_id: &str) -> Result<()>;

    /// Marks every unread message addressed to `reader_id` as read and zeroes their counter.
    ///
    /// Returns the number of messages that changed state.
    async fn mark_read(&self, conversation_id: Uuid, reader_id: &str, read_at: OffsetDateTime) -> Result<u64>;

    /// Sum of `user_id`'s counters across their active conversations.
    async fn unread_total(&self, user_id: &str) -> Result<i64>;

    /// Recomputes every participant's counter from the message log and stores the result.
    async fn recount_unread(&self, conversation_id: Uuid) -> Result<BTreeMap<String, i64>>;

    /// Conversation ids in ascending order, starting after `after`.
    async fn list_ids(&self, after: Option<Uuid>, limit: u32) -> Result<Vec<Uuid>>;
}

/// Ordered, append-mostly record of the messages in each conversation.
#[async_trait]
pub trait MessageLog: Send + Sync + std::fmt::Debug {
    async fn append(&self, new: NewMessage) -> Result<Message>;

    async fn find(&self, id: Uuid) -> Result<Option<Message>>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Message>>;

    /// Non-deleted messages of a conversation, newest first.
    async fn list_visible(&self, conversation_id: Uuid, page: Page) -> Result<Vec<Message>>;

    async fn count_visible(&self, conversation_id: Uuid) -> Result<u64>;

    async fn soft_delete(&self, id: Uuid, deleted_at: OffsetDateTime) -> Result<()>;

    /// Replaces the content of a non-deleted message.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message is missing or deleted.
    async fn edit(&self, id: Uuid, content: &str, edited_at: OffsetDateTime) -> Result<Message>;
}
