use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::llm::Feedback;
use crate::messages::ChatMessage;
use crate::models::{Conversation, ConversationListItem, ConversationStatus, ScenarioTitle};

use super::{
    ConversationPatch, ConversationStateUpdate, ConversationStore, NewConversation, PgStore,
    StoreError, StoreFuture, status_from_db,
};

const CONVERSATION_COLUMNS: &str = "c.id, c.user_id, c.scenario_id, c.name, c.messages, c.feedback,
     c.status, c.version, c.created_at, c.updated_at";

impl PgStore {
    async fn fetch_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|row| conversation_from_row(&row)).transpose()
    }

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<Conversation, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO conversations AS c (
                id, user_id, scenario_id, name, messages, feedback, status, version, created_at, updated_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, 1, NOW(), NOW())
             ON CONFLICT (id) DO NOTHING
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(&conversation.id)
        .bind(conversation.user_id)
        .bind(conversation.scenario_id)
        .bind(&conversation.name)
        .bind(Json(&conversation.messages))
        .bind(conversation.feedback.as_ref().map(Json))
        .bind(conversation.status.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => conversation_from_row(&row),
            None => Err(StoreError::Duplicate),
        }
    }

    async fn write_conversation_state(
        &self,
        id: &str,
        expected_version: i64,
        update: ConversationStateUpdate,
    ) -> Result<Conversation, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE conversations AS c
             SET messages = $3,
                 feedback = $4,
                 status = $5,
                 version = c.version + 1,
                 updated_at = NOW()
             WHERE c.id = $1
               AND c.version = $2
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(id)
        .bind(expected_version)
        .bind(Json(&update.messages))
        .bind(update.feedback.as_ref().map(Json))
        .bind(update.status.as_str())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => conversation_from_row(&row),
            None => Err(StoreError::VersionConflict),
        }
    }

    async fn apply_conversation_patch(
        &self,
        id: &str,
        expected_version: i64,
        patch: ConversationPatch,
    ) -> Result<Conversation, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE conversations AS c
             SET name = COALESCE($3, c.name),
                 messages = COALESCE($4, c.messages),
                 feedback = COALESCE($5, c.feedback),
                 status = COALESCE($6, c.status),
                 version = c.version + 1,
                 updated_at = NOW()
             WHERE c.id = $1
               AND c.version = $2
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(id)
        .bind(expected_version)
        .bind(patch.name)
        .bind(patch.messages.as_ref().map(Json))
        .bind(patch.feedback.as_ref().map(Json))
        .bind(patch.status.map(ConversationStatus::as_str))
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => conversation_from_row(&row),
            None => Err(StoreError::VersionConflict),
        }
    }

    async fn fetch_conversations_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationListItem>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS}, s.title AS scenario_title
             FROM conversations c
             LEFT JOIN scenarios s ON s.id = c.scenario_id
             WHERE c.user_id = $1
             ORDER BY c.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                let scenario_title: Option<String> = row.try_get("scenario_title")?;
                Ok(ConversationListItem {
                    conversation: conversation_from_row(row)?,
                    scenarios: scenario_title.map(|title| ScenarioTitle { title }),
                })
            })
            .collect()
    }

    async fn remove_conversation(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl ConversationStore for PgStore {
    fn get_conversation<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(self.fetch_conversation(id))
    }

    fn insert_conversation<'a>(
        &'a self,
        conversation: NewConversation,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(self.create_conversation(conversation))
    }

    fn update_conversation_state<'a>(
        &'a self,
        id: &'a str,
        expected_version: i64,
        update: ConversationStateUpdate,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(self.write_conversation_state(id, expected_version, update))
    }

    fn patch_conversation<'a>(
        &'a self,
        id: &'a str,
        expected_version: i64,
        patch: ConversationPatch,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(self.apply_conversation_patch(id, expected_version, patch))
    }

    fn list_conversations<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<ConversationListItem>> {
        Box::pin(self.fetch_conversations_for_user(user_id))
    }

    fn delete_conversation<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(self.remove_conversation(id))
    }
}

fn conversation_from_row(row: &PgRow) -> Result<Conversation, StoreError> {
    let messages_raw: Value = row.try_get("messages")?;
    let messages = serde_json::from_value::<Vec<ChatMessage>>(messages_raw)
        .map_err(|err| StoreError::InvalidData(format!("conversation messages invalid: {err}")))?;
    let feedback_raw: Option<Value> = row.try_get("feedback")?;
    let feedback = feedback_raw
        .map(serde_json::from_value::<Feedback>)
        .transpose()
        .map_err(|err| StoreError::InvalidData(format!("conversation feedback invalid: {err}")))?;
    let status_raw: String = row.try_get("status")?;

    Ok(Conversation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        scenario_id: row.try_get("scenario_id")?,
        name: row.try_get("name")?,
        messages,
        feedback,
        status: status_from_db(&status_raw)?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
