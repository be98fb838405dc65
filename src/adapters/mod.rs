pub mod database;
pub mod directory;
pub mod memory;
pub mod storage;
pub mod store;

use crate::adapters::directory::{ConnectionLookup, ProfileLookup};
use crate::adapters::storage::MediaSigner;
use crate::adapters::store::{ConversationStore, MessageLog};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Cheap connectivity check used by the readiness probe.
#[async_trait]
pub trait Probe: Send + Sync + std::fmt::Debug {
    async fn ping(&self) -> Result<()>;
}

/// Every storage and collaborator handle the services need, already type-erased.
#[derive(Clone, Debug)]
pub struct Backends {
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageLog>,
    pub connections: Arc<dyn ConnectionLookup>,
    pub profiles: Arc<dyn ProfileLookup>,
    pub signer: Arc<dyn MediaSigner>,
    pub database: Arc<dyn Probe>,
    pub storage: Arc<dyn Probe>,
}

impl Backends {
    /// Wires a single store that provides conversations, messages and the read-only directories.
    #[must_use]
    pub fn from_store<S, M>(store: Arc<S>, signer: Arc<M>) -> Self
    where
        S: ConversationStore + MessageLog + ConnectionLookup + ProfileLookup + Probe + 'static,
        M: MediaSigner + Probe + 'static,
    {
        Self {
            conversations: Arc::clone(&store) as Arc<dyn ConversationStore>,
            messages: Arc::clone(&store) as Arc<dyn MessageLog>,
            connections: Arc::clone(&store) as Arc<dyn ConnectionLookup>,
            profiles: Arc::clone(&store) as Arc<dyn ProfileLookup>,
            database: store as Arc<dyn Probe>,
            signer: Arc::clone(&signer) as Arc<dyn MediaSigner>,
            storage: signer as Arc<dyn Probe>,
        }
    }

    #[must_use]
    pub fn postgres(pool: database::DbPool, signer: storage::S3Signer) -> Self {
        Self::from_store(Arc::new(database::PgStore::new(pool)), Arc::new(signer))
    }

    #[must_use]
    pub fn in_memory(store: Arc<memory::InMemoryStore>, signer: storage::PublicUrlSigner) -> Self {
        Self::from_store(store, Arc::new(signer))
    }
}
