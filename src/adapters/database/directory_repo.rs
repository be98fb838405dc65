use crate::adapters::database::PgStore;
use crate::adapters::database::records::ProfileRecord;
use crate::adapters::directory::{ConnectionLookup, ProfileLookup};
use crate::domain::profile::ProfileSummary;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

// The connections and profiles tables belong to the profile/network services; only read here.

#[async_trait]
impl ConnectionLookup for PgStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn exists_accepted_connection(&self, user_a: &str, user_b: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM connections
                WHERE status = 'accepted'
                  AND ((requester = $1 AND recipient = $2) OR (requester = $2 AND recipient = $1))
            )
            ",
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl ProfileLookup for PgStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_summary(&self, user_id: &str) -> Result<Option<ProfileSummary>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, full_name, profile_image, headline FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, user_ids), fields(count = user_ids.len()))]
    async fn get_summaries(&self, user_ids: &[String]) -> Result<HashMap<String, ProfileSummary>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let records = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, full_name, profile_image, headline FROM profiles WHERE user_id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(|r| (r.user_id.clone(), r.into())).collect())
    }
}
