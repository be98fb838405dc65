use crate::adapters::database::records::{ConversationRecord, ParticipantRecord};
use crate::adapters::database::{PgStore, UNIQUE_VIOLATION};
use crate::adapters::store::ConversationStore;
use crate::domain::conversation::{Conversation, LastMessage, NewDirectConversation, PairKey};
use crate::domain::pagination::Page;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::PgConnection;
use std::collections::{BTreeMap, HashMap};
use time::OffsetDateTime;
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str = r"
    c.id, c.conversation_type, c.pair_key, c.created_by, c.is_active,
    c.last_message_content, c.last_message_sender_id, c.last_message_at, c.last_message_type,
    c.created_at, c.updated_at
";

/// Attaches participant rows to conversation rows, preserving the row order.
async fn hydrate(conn: &mut PgConnection, records: Vec<ConversationRecord>) -> Result<Vec<Conversation>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let participants = sqlx::query_as::<_, ParticipantRecord>(
        r"
        SELECT conversation_id, user_id, unread_count
        FROM conversation_participants
        WHERE conversation_id = ANY($1)
        ORDER BY conversation_id, position ASC, joined_at ASC
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_conversation: HashMap<Uuid, Vec<ParticipantRecord>> = HashMap::with_capacity(ids.len());
    for participant in participants {
        by_conversation.entry(participant.conversation_id).or_default().push(participant);
    }

    records
        .into_iter()
        .map(|record| {
            let participants = by_conversation.remove(&record.id).unwrap_or_default();
            record.into_domain(participants)
        })
        .collect()
}

#[async_trait]
impl ConversationStore for PgStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Conversation>> {
        let mut conn = self.pool.acquire().await?;
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match record {
            Some(record) => Ok(hydrate(&mut conn, vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    #[tracing::instrument(level = "debug", skip(self), fields(pair_key = %pair_key))]
    async fn find_direct(&self, pair_key: &PairKey) -> Result<Option<Conversation>> {
        let mut conn = self.pool.acquire().await?;
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c \
             WHERE c.pair_key = $1 AND c.conversation_type = 'direct'"
        ))
        .bind(pair_key.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        match record {
            Some(record) => Ok(hydrate(&mut conn, vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, new), fields(pair_key = %new.pair_key))]
    async fn insert_direct(&self, new: NewDirectConversation) -> Result<Conversation> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            WITH c AS (
                INSERT INTO conversations (id, conversation_type, pair_key, created_by)
                VALUES ($1, 'direct', $2, $3)
                RETURNING *
            )
            SELECT {CONVERSATION_COLUMNS} FROM c
            "
        ))
        .bind(new.id)
        .bind(new.pair_key.as_str())
        .bind(&new.created_by)
        .fetch_one(&mut *tx)
        .await;

        let record = match inserted {
            Ok(record) => record,
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                return Err(AppError::Conflict(format!("Direct conversation {} already exists", new.pair_key)));
            }
            Err(e) => return Err(AppError::Database(e)),
        };

        for (position, user_id) in (0_i16..).zip(new.participants.iter()) {
            sqlx::query(
                r"
                INSERT INTO conversation_participants (conversation_id, user_id, position, unread_count)
                VALUES ($1, $2, $3, 0)
                ",
            )
            .bind(record.id)
            .bind(user_id)
            .bind(position)
            .execute(&mut *tx)
            .await?;
        }

        let conversation = hydrate(&mut tx, vec![record]).await?.pop().ok_or(AppError::Internal)?;
        tx.commit().await?;

        Ok(conversation)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_for_participant(&self, user_id: &str, page: Page) -> Result<Vec<Conversation>> {
        let offset = i64::try_from(page.offset()).map_err(|_| AppError::BadRequest("Page out of range".into()))?;
        let mut conn = self.pool.acquire().await?;
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations c
            JOIN conversation_participants p ON p.conversation_id = c.id
            WHERE p.user_id = $1 AND c.is_active
            ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        hydrate(&mut conn, records).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn count_for_participant(&self, user_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM conversations c
            JOIN conversation_participants p ON p.conversation_id = c.id
            WHERE p.user_id = $1 AND c.is_active
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[tracing::instrument(level = "debug", skip(self, snapshot))]
    async fn record_message(&self, conversation_id: Uuid, snapshot: &LastMessage, receiver_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE conversations
            SET last_message_content = CASE WHEN last_message_at IS NULL OR last_message_at <= $4
                                            THEN $2 ELSE last_message_content END,
                last_message_sender_id = CASE WHEN last_message_at IS NULL OR last_message_at <= $4
                                              THEN $3 ELSE last_message_sender_id END,
                last_message_type = CASE WHEN last_message_at IS NULL OR last_message_at <= $4
                                         THEN $5 ELSE last_message_type END,
                last_message_at = GREATEST(COALESCE(last_message_at, $4), $4),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .bind(&snapshot.content)
        .bind(&snapshot.sender_id)
        .bind(snapshot.timestamp)
        .bind(snapshot.message_type.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Conversation {conversation_id} not found")));
        }

        sqlx::query(
            r"
            INSERT INTO conversation_participants (conversation_id, user_id, position, unread_count)
            VALUES ($1, $2, 0, 1)
            ON CONFLICT (conversation_id, user_id)
            DO UPDATE SET unread_count = conversation_participants.unread_count + 1
            ",
        )
        .bind(conversation_id)
        .bind(receiver_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_read(&self, conversation_id: Uuid, reader_id: &str, read_at: OffsetDateTime) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Hold the reader's counter row so a concurrent send's increment lands after the reset.
        let counter: Option<i64> = sqlx::query_scalar(
            r"
            SELECT unread_count
            FROM conversation_participants
            WHERE conversation_id = $1 AND user_id = $2
            FOR UPDATE
            ",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .fetch_optional(&mut *tx)
        .await?;

        let marked = sqlx::query(
            r"
            UPDATE messages
            SET is_read = TRUE, read_at = $3, updated_at = $3
            WHERE conversation_id = $1 AND receiver_id = $2 AND NOT is_read
            ",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .bind(read_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if counter.is_some() {
            sqlx::query(
                "UPDATE conversation_participants SET unread_count = 0 WHERE conversation_id = $1 AND user_id = $2",
            )
            .bind(conversation_id)
            .bind(reader_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(marked)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn unread_total(&self, user_id: &str) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(p.unread_count), 0)::BIGINT
            FROM conversation_participants p
            JOIN conversations c ON c.id = p.conversation_id
            WHERE p.user_id = $1 AND c.is_active
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn recount_unread(&self, conversation_id: Uuid) -> Result<BTreeMap<String, i64>> {
        let mut tx = self.pool.begin().await?;

        // Serializes against record_message, which updates the conversation row first.
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM conversations WHERE id = $1 FOR UPDATE")
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Conversation {conversation_id} not found")));
        }

        let rows = sqlx::query_as::<_, (String, i64)>(
            r"
            UPDATE conversation_participants p
            SET unread_count = (
                SELECT COUNT(*)
                FROM messages m
                WHERE m.conversation_id = p.conversation_id
                  AND m.receiver_id = p.user_id
                  AND NOT m.is_read
                  AND NOT m.is_deleted
            )
            WHERE p.conversation_id = $1
            RETURNING p.user_id, p.unread_count
            ",
        )
        .bind(conversation_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(rows.into_iter().collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_ids(&self, after: Option<Uuid>, limit: u32) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r"
            SELECT id FROM conversations
            WHERE $1::uuid IS NULL OR id > $1
            ORDER BY id ASC
            LIMIT $2
            ",
        )
        .bind(after)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
