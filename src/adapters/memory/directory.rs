use crate::adapters::directory::{ConnectionLookup, ProfileLookup};
use crate::adapters::memory::InMemoryStore;
use crate::domain::profile::ProfileSummary;
use crate::error::Result;
use async_trait::async_trait;

fn edge(user_a: &str, user_b: &str) -> (String, String) {
    if user_a <= user_b {
        (user_a.to_string(), user_b.to_string())
    } else {
        (user_b.to_string(), user_a.to_string())
    }
}

impl InMemoryStore {
    /// Records an accepted connection between two users.
    pub fn connect(&self, user_a: &str, user_b: &str) {
        self.connections.insert(edge(user_a, user_b));
    }

    pub fn disconnect(&self, user_a: &str, user_b: &str) {
        self.connections.remove(&edge(user_a, user_b));
    }

    pub fn upsert_profile(&self, profile: ProfileSummary) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ConnectionLookup for InMemoryStore {
    async fn exists_accepted_connection(&self, user_a: &str, user_b: &str) -> Result<bool> {
        Ok(self.connections.contains(&edge(user_a, user_b)))
    }
}

#[async_trait]
impl ProfileLookup for InMemoryStore {
    async fn get_summary(&self, user_id: &str) -> Result<Option<ProfileSummary>> {
        Ok(self.profiles.get(user_id).map(|p| p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connections_are_symmetric() {
        let store = InMemoryStore::new();
        store.connect("bob", "alice");

        assert!(store.exists_accepted_connection("alice", "bob").await.unwrap());
        assert!(store.exists_accepted_connection("bob", "alice").await.unwrap());
        assert!(!store.exists_accepted_connection("alice", "carol").await.unwrap());

        store.disconnect("alice", "bob");
        assert!(!store.exists_accepted_connection("bob", "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_summaries_skips_unknown_users() {
        let store = InMemoryStore::new();
        store.upsert_profile(ProfileSummary {
            user_id: "alice".to_string(),
            full_name: Some("Alice Smith".to_string()),
            profile_image: None,
            headline: None,
        });

        let summaries = store.get_summaries(&["alice".to_string(), "ghost".to_string()]).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries["alice"].full_name.as_deref(), Some("Alice Smith"));
    }
}
