use crate::domain::profile::ProfileSummary;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Read-only view of the social graph.
#[async_trait]
pub trait ConnectionLookup: Send + Sync + std::fmt::Debug {
    /// Whether an accepted connection exists between the two users, in either direction.
    async fn exists_accepted_connection(&self, user_a: &str, user_b: &str) -> Result<bool>;
}

/// Read-only view of user profiles.
#[async_trait]
pub trait ProfileLookup: Send + Sync + std::fmt::Debug {
    async fn get_summary(&self, user_id: &str) -> Result<Option<ProfileSummary>>;

    async fn get_summaries(&self, user_ids: &[String]) -> Result<HashMap<String, ProfileSummary>> {
        let mut summaries = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(summary) = self.get_summary(user_id).await? {
                summaries.insert(user_id.clone(), summary);
            }
        }
        Ok(summaries)
    }
}
