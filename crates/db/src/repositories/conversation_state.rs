use chrono::Utc;
use sqlx::Row;

use tertulia_core::dialog::DialogStack;

use super::{ConversationStateRepository, RepositoryError};
use crate::DbPool;

pub struct SqlConversationStateRepository {
    pool: DbPool,
}

impl SqlConversationStateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ConversationStateRepository for SqlConversationStateRepository {
    async fn load(&self, conversation_id: &str) -> Result<Option<DialogStack>, RepositoryError> {
        let row = sqlx::query(
            "SELECT dialog_stack_json FROM conversation_state WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let snapshot: String = row.try_get("dialog_stack_json")?;
        DialogStack::from_snapshot(&snapshot).map(Some).map_err(|e| {
            RepositoryError::Decode(format!(
                "invalid dialog stack for conversation `{conversation_id}`: {e}"
            ))
        })
    }

    async fn save(
        &self,
        conversation_id: &str,
        channel_id: &str,
        stack: &DialogStack,
    ) -> Result<(), RepositoryError> {
        let snapshot = stack
            .to_snapshot()
            .map_err(|e| RepositoryError::Decode(format!("dialog stack encode failed: {e}")))?;
        let now = Utc::now().to_rfc3339();
        let frame_count = i64::try_from(stack.len())
            .map_err(|e| RepositoryError::Decode(format!("frame count out of range: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO conversation_state (
                conversation_id, channel_id, dialog_stack_json, frame_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(conversation_id) DO UPDATE SET
                channel_id = excluded.channel_id,
                dialog_stack_json = excluded.dialog_stack_json,
                frame_count = excluded.frame_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(conversation_id)
        .bind(channel_id)
        .bind(&snapshot)
        .bind(frame_count)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversation_state WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
