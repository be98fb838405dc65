use crate::adapters::database::PgStore;
use crate::adapters::database::records::MessageRecord;
use crate::adapters::store::MessageLog;
use crate::domain::message::{Message, NewMessage};
use crate::domain::pagination::Page;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = r"
    id, conversation_id, sender_id, receiver_id, content, message_type, media_key, media_file_name,
    is_read, read_at, is_edited, edited_at, is_deleted, deleted_at, reply_to, reactions,
    created_at, updated_at
";

fn into_messages(records: Vec<MessageRecord>) -> Result<Vec<Message>> {
    records.into_iter().map(Message::try_from).collect()
}

#[async_trait]
impl MessageLog for PgStore {
    /// Records a new message in the database.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, new), fields(conversation_id = %new.conversation_id))]
    async fn append(&self, new: NewMessage) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, message_type,
                                  media_key, media_file_name, reply_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(new.id)
        .bind(new.conversation_id)
        .bind(&new.sender_id)
        .bind(&new.receiver_id)
        .bind(&new.content)
        .bind(new.message_type.as_str())
        .bind(&new.media_key)
        .bind(&new.media_file_name)
        .bind(new.reply_to)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => record.try_into(),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => {
                // Foreign key violation: the conversation or reply target does not exist
                Err(AppError::NotFound(format!("Conversation {} not found", new.conversation_id)))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Message::try_from).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self, ids), fields(count = ids.len()))]
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let records =
            sqlx::query_as::<_, MessageRecord>(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ANY($1)"))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        into_messages(records)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_visible(&self, conversation_id: Uuid, page: Page) -> Result<Vec<Message>> {
        let offset = i64::try_from(page.offset()).map_err(|_| AppError::BadRequest("Page out of range".into()))?;
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE conversation_id = $1 AND NOT is_deleted
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(conversation_id)
        .bind(i64::from(page.limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        into_messages(records)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn count_visible(&self, conversation_id: Uuid) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND NOT is_deleted")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn soft_delete(&self, id: Uuid, deleted_at: OffsetDateTime) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET is_deleted = TRUE, deleted_at = COALESCE(deleted_at, $2), updated_at = $2
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(deleted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Message not found".to_string()));
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, content))]
    async fn edit(&self, id: Uuid, content: &str, edited_at: OffsetDateTime) -> Result<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r"
            UPDATE messages
            SET content = $2, is_edited = TRUE, edited_at = $3, updated_at = $3
            WHERE id = $1 AND NOT is_deleted
            RETURNING {MESSAGE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(content)
        .bind(edited_at)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or_else(|| AppError::NotFound("Message not found".to_string()))?.try_into()
    }
}
