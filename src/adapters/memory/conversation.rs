use crate::adapters::memory::InMemoryStore;
use crate::adapters::store::ConversationStore;
use crate::domain::conversation::{Conversation, LastMessage, NewDirectConversation, PairKey};
use crate::domain::pagination::Page;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

// Most recent snapshot first, never-messaged conversations last.
fn by_recent_activity(a: &Conversation, b: &Conversation) -> Ordering {
    let a_ts = a.last_message.as_ref().map(|m| m.timestamp);
    let b_ts = b.last_message.as_ref().map(|m| m.timestamp);
    match (a_ts, b_ts) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.created_at.cmp(&a.created_at))
    .then_with(|| b.id.cmp(&a.id))
}

impl InMemoryStore {
    async fn active_for(&self, user_id: &str) -> Vec<Conversation> {
        let mut matching = Vec::new();
        for handle in self.all_conversation_handles() {
            let conversation = handle.lock().await;
            if conversation.is_active && conversation.is_participant(user_id) {
                matching.push(conversation.clone());
            }
        }
        matching
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Conversation>> {
        match self.conversation_handle(id) {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_direct(&self, pair_key: &PairKey) -> Result<Option<Conversation>> {
        let id = self.direct_index.get(pair_key.as_str()).map(|entry| *entry.value());
        match id {
            Some(id) => self.find(id).await,
            None => Ok(None),
        }
    }

    async fn insert_direct(&self, new: NewDirectConversation) -> Result<Conversation> {
        match self.direct_index.entry(new.pair_key.as_str().to_string()) {
            Entry::Occupied(_) => {
                Err(AppError::Conflict(format!("Direct conversation {} already exists", new.pair_key)))
            }
            Entry::Vacant(slot) => {
                let conversation = new.into_conversation(OffsetDateTime::now_utc());
                self.conversations.insert(conversation.id, Arc::new(Mutex::new(conversation.clone())));
                // Publish the index entry last so readers never see a dangling id.
                slot.insert(conversation.id);
                Ok(conversation)
            }
        }
    }

    async fn list_for_participant(&self, user_id: &str, page: Page) -> Result<Vec<Conversation>> {
        let mut conversations = self.active_for(user_id).await;
        conversations.sort_by(by_recent_activity);

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(conversations.into_iter().skip(offset).take(page.limit as usize).collect())
    }

    async fn count_for_participant(&self, user_id: &str) -> Result<u64> {
        Ok(self.active_for(user_id).await.len() as u64)
    }

    async fn record_message(&self, conversation_id: Uuid, snapshot: &LastMessage, receiver_id: &str) -> Result<()> {
        let handle = self
            .conversation_handle(conversation_id)
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;

        handle.lock().await.apply_message(snapshot, receiver_id);
        Ok(())
    }

    async fn mark_read(&self, conversation_id: Uuid, reader_id: &str, read_at: OffsetDateTime) -> Result<u64> {
        let handle = self
            .conversation_handle(conversation_id)
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;

        let mut conversation = handle.lock().await;

        let mut marked = 0;
        for id in self.timeline(conversation_id) {
            if let Some(mut message) = self.messages.get_mut(&id)
                && message.receiver_id == reader_id
                && !message.is_read
            {
                message.is_read = true;
                message.read_at = Some(read_at);
                message.updated_at = read_at;
                marked += 1;
            }
        }

        if let Some(count) = conversation.unread_counts.get_mut(reader_id) {
            *count = 0;
        }

        Ok(marked)
    }

    async fn unread_total(&self, user_id: &str) -> Result<i64> {
        Ok(self.active_for(user_id).await.iter().map(|c| c.unread_for(user_id)).sum())
    }

    async fn recount_unread(&self, conversation_id: Uuid) -> Result<BTreeMap<String, i64>> {
        let handle = self
            .conversation_handle(conversation_id)
            .ok_or_else(|| AppError::NotFound(format!("Conversation {conversation_id} not found")))?;

        let mut conversation = handle.lock().await;
        let messages = self.conversation_messages(conversation_id);

        let mut counts: BTreeMap<String, i64> = conversation.unread_counts.keys().map(|k| (k.clone(), 0)).collect();
        for participant in &conversation.participants {
            counts.entry(participant.clone()).or_insert(0);
        }
        for (user_id, count) in &mut counts {
            *count = messages.iter().filter(|m| m.is_unread_for(user_id)).count() as i64;
        }

        conversation.unread_counts.clone_from(&counts);
        Ok(counts)
    }

    async fn list_ids(&self, after: Option<Uuid>, limit: u32) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> =
            self.conversations.iter().map(|entry| *entry.key()).filter(|id| after.is_none_or(|a| *id > a)).collect();
        ids.sort_unstable();
        ids.truncate(limit as usize);
        Ok(ids)
    }
}
