//! In-process backend. Each conversation sits behind its own async mutex, which plays the role
//! of the row lock the Postgres backend relies on.

pub mod conversation;
pub mod directory;
pub mod message;

use crate::adapters::Probe;
use crate::domain::conversation::Conversation;
use crate::domain::message::Message;
use crate::domain::profile::ProfileSummary;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: DashMap<Uuid, Arc<Mutex<Conversation>>>,
    direct_index: DashMap<String, Uuid>,
    messages: DashMap<Uuid, Message>,
    // Conversation id -> message ids in append order.
    timelines: DashMap<Uuid, Vec<Uuid>>,
    connections: DashSet<(String, String)>,
    profiles: DashMap<String, ProfileSummary>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn conversation_handle(&self, id: Uuid) -> Option<Arc<Mutex<Conversation>>> {
        self.conversations.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn all_conversation_handles(&self) -> Vec<Arc<Mutex<Conversation>>> {
        self.conversations.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    fn timeline(&self, conversation_id: Uuid) -> Vec<Uuid> {
        self.timelines.get(&conversation_id).map(|ids| ids.clone()).unwrap_or_default()
    }

    /// Messages of a conversation in append order, cloned out of the map.
    fn conversation_messages(&self, conversation_id: Uuid) -> Vec<Message> {
        self.timeline(conversation_id).iter().filter_map(|id| self.messages.get(id).map(|m| m.clone())).collect()
    }
}

#[async_trait]
impl Probe for InMemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
