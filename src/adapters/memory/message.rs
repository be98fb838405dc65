use crate::adapters::memory::InMemoryStore;
use crate::adapters::store::MessageLog;
use crate::domain::message::{Message, NewMessage};
use crate::domain::pagination::Page;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

impl InMemoryStore {
    fn visible_newest_first(&self, conversation_id: Uuid) -> Vec<Message> {
        let mut visible: Vec<Message> =
            self.conversation_messages(conversation_id).into_iter().filter(|m| !m.is_deleted).collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        visible
    }
}

#[async_trait]
impl MessageLog for InMemoryStore {
    async fn append(&self, new: NewMessage) -> Result<Message> {
        if !self.conversations.contains_key(&new.conversation_id) {
            return Err(AppError::NotFound(format!("Conversation {} not found", new.conversation_id)));
        }

        let message = new.into_message(OffsetDateTime::now_utc());
        self.messages.insert(message.id, message.clone());
        self.timelines.entry(message.conversation_id).or_default().push(message.id);
        Ok(message)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Message>> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Message>> {
        Ok(ids.iter().filter_map(|id| self.messages.get(id).map(|m| m.clone())).collect())
    }

    async fn list_visible(&self, conversation_id: Uuid, page: Page) -> Result<Vec<Message>> {
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(self.visible_newest_first(conversation_id).into_iter().skip(offset).take(page.limit as usize).collect())
    }

    async fn count_visible(&self, conversation_id: Uuid) -> Result<u64> {
        Ok(self.visible_newest_first(conversation_id).len() as u64)
    }

    async fn soft_delete(&self, id: Uuid, deleted_at: OffsetDateTime) -> Result<()> {
        let mut message = self.messages.get_mut(&id).ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;
        message.is_deleted = true;
        message.deleted_at.get_or_insert(deleted_at);
        message.updated_at = deleted_at;
        Ok(())
    }

    async fn edit(&self, id: Uuid, content: &str, edited_at: OffsetDateTime) -> Result<Message> {
        let mut message = self
            .messages
            .get_mut(&id)
            .filter(|m| !m.is_deleted)
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;
        message.content = content.to_string();
        message.is_edited = true;
        message.edited_at = Some(edited_at);
        message.updated_at = edited_at;
        Ok(message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::ConversationStore;
    use crate::domain::conversation::NewDirectConversation;
    use crate::domain::message::MessageType;

    async fn seeded() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let conversation = store.insert_direct(NewDirectConversation::new("alice", "bob")).await.unwrap();
        (store, conversation.id)
    }

    fn text(conversation_id: Uuid, content: &str) -> NewMessage {
        NewMessage {
            id: Uuid::now_v7(),
            conversation_id,
            sender_id: "alice".to_string(),
            receiver_id: "bob".to_string(),
            content: content.to_string(),
            message_type: MessageType::Text,
            media_key: None,
            media_file_name: None,
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_append_requires_existing_conversation() {
        let store = InMemoryStore::new();
        let result = store.append(text(Uuid::now_v7(), "hello")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_visible_is_newest_first_and_skips_deleted() {
        let (store, conversation_id) = seeded().await;
        let first = store.append(text(conversation_id, "one")).await.unwrap();
        let second = store.append(text(conversation_id, "two")).await.unwrap();
        let third = store.append(text(conversation_id, "three")).await.unwrap();
        store.soft_delete(second.id, OffsetDateTime::now_utc()).await.unwrap();

        let listed = store.list_visible(conversation_id, Page::new(None, None, 50, 100)).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|m| m.id).collect();

        assert_eq!(ids, vec![third.id, first.id]);
        assert_eq!(store.count_visible(conversation_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_visible_paginates() {
        let (store, conversation_id) = seeded().await;
        for i in 0..5 {
            store.append(text(conversation_id, &format!("m{i}"))).await.unwrap();
        }

        let page = store.list_visible(conversation_id, Page::new(Some(3), Some(2), 50, 100)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].content, "m0");
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_first_timestamp() {
        let (store, conversation_id) = seeded().await;
        let message = store.append(text(conversation_id, "bye")).await.unwrap();

        let first = OffsetDateTime::now_utc();
        store.soft_delete(message.id, first).await.unwrap();
        store.soft_delete(message.id, first + time::Duration::seconds(5)).await.unwrap();

        let stored = MessageLog::find(&store, message.id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert_eq!(stored.deleted_at, Some(first));
    }

    #[tokio::test]
    async fn test_edit_rejects_deleted_message() {
        let (store, conversation_id) = seeded().await;
        let message = store.append(text(conversation_id, "draft")).await.unwrap();

        let edited = store.edit(message.id, "final", OffsetDateTime::now_utc()).await.unwrap();
        assert_eq!(edited.content, "final");
        assert!(edited.is_edited);

        store.soft_delete(message.id, OffsetDateTime::now_utc()).await.unwrap();
        let result = store.edit(message.id, "again", OffsetDateTime::now_utc()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
