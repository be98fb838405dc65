use crate::adapters::store::ConversationStore;
use crate::domain::conversation::{Conversation, NewDirectConversation, PairKey};
use crate::error::{AppError, Result};
use std::sync::Arc;

/// Finds or creates the single direct conversation between two users.
#[derive(Clone, Debug)]
pub struct ConversationResolver {
    store: Arc<dyn ConversationStore>,
}

impl ConversationResolver {
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Returns the direct conversation for the pair, creating it on first contact.
    ///
    /// The result does not depend on argument order. An existing conversation is returned as-is,
    /// even when inactive.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` if both ids name the same user.
    /// Returns `AppError::Database` if the store fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn resolve_direct(&self, user_a: &str, user_b: &str) -> Result<Conversation> {
        if user_a == user_b {
            return Err(AppError::BadRequest("Cannot start a conversation with yourself".to_string()));
        }

        let pair_key = PairKey::direct(user_a, user_b);
        if let Some(existing) = self.store.find_direct(&pair_key).await? {
            return Ok(existing);
        }

        match self.store.insert_direct(NewDirectConversation::new(user_a, user_b)).await {
            Ok(created) => {
                tracing::debug!(conversation_id = %created.id, "Created direct conversation");
                Ok(created)
            }
            Err(AppError::Conflict(_)) => {
                // Lost the creation race; the winner's row is now visible.
                self.store.find_direct(&pair_key).await?.ok_or_else(|| {
                    AppError::InternalMsg(format!("Direct conversation {pair_key} vanished after conflict"))
                })
            }
            Err(e) => Err(e),
        }
    }
}
