use std::future::Future;
use std::pin::Pin;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

use crate::llm::Feedback;
use crate::messages::ChatMessage;
use crate::models::{Conversation, ConversationListItem, ConversationStatus, Profile, Scenario};

mod conversations;
mod memory;
mod profiles;
mod scenarios;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("record was modified concurrently")]
    VersionConflict,
    #[error("record already exists")]
    Duplicate,
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub id: String,
    pub user_id: Uuid,
    pub scenario_id: Option<Uuid>,
    pub name: String,
    pub messages: Vec<ChatMessage>,
    pub feedback: Option<Feedback>,
    pub status: ConversationStatus,
}

/// Full replacement of the mutable session state, applied only when the
/// stored version still matches.
#[derive(Debug, Clone)]
pub struct ConversationStateUpdate {
    pub messages: Vec<ChatMessage>,
    pub feedback: Option<Feedback>,
    pub status: ConversationStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub name: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub feedback: Option<Feedback>,
    pub status: Option<ConversationStatus>,
}

#[derive(Debug, Clone)]
pub struct NewScenario {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub context: String,
    pub employee_name: String,
    pub employee_avatar: String,
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub context: Option<String>,
    pub employee_name: Option<String>,
    pub employee_avatar: Option<String>,
    pub tips: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub trait ConversationStore: Send + Sync {
    fn get_conversation<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<Conversation>>;

    /// Fails with [`StoreError::Duplicate`] when the id is already taken.
    fn insert_conversation<'a>(
        &'a self,
        conversation: NewConversation,
    ) -> StoreFuture<'a, Conversation>;

    /// Fails with [`StoreError::VersionConflict`] when the row moved past
    /// `expected_version` (or no longer exists).
    fn update_conversation_state<'a>(
        &'a self,
        id: &'a str,
        expected_version: i64,
        update: ConversationStateUpdate,
    ) -> StoreFuture<'a, Conversation>;

    /// Applies the present fields. Same version rule as
    /// [`ConversationStore::update_conversation_state`].
    fn patch_conversation<'a>(
        &'a self,
        id: &'a str,
        expected_version: i64,
        patch: ConversationPatch,
    ) -> StoreFuture<'a, Conversation>;

    fn list_conversations<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<ConversationListItem>>;

    fn delete_conversation<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool>;
}

pub trait ScenarioStore: Send + Sync {
    /// Built-in scenarios plus the ones owned by `user_id`, oldest first.
    fn list_scenarios<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Scenario>>;

    fn get_scenario<'a>(&'a self, id: Uuid) -> StoreFuture<'a, Option<Scenario>>;

    fn insert_scenario<'a>(&'a self, scenario: NewScenario) -> StoreFuture<'a, Scenario>;

    fn update_scenario<'a>(
        &'a self,
        id: Uuid,
        patch: ScenarioPatch,
    ) -> StoreFuture<'a, Option<Scenario>>;

    fn delete_scenario<'a>(&'a self, id: Uuid) -> StoreFuture<'a, bool>;
}

pub trait ProfileStore: Send + Sync {
    fn ensure_profile<'a>(&'a self, user_id: Uuid, email: Option<&'a str>) -> StoreFuture<'a, ()>;

    fn get_profile<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Option<Profile>>;

    fn update_profile<'a>(
        &'a self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> StoreFuture<'a, Option<Profile>>;
}

pub trait Datastore: ConversationStore + ScenarioStore + ProfileStore {
    fn ping<'a>(&'a self) -> StoreFuture<'a, ()>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ping_inner(&self) -> Result<(), StoreError> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

impl Datastore for PgStore {
    fn ping<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(self.ping_inner())
    }
}

fn status_from_db(value: &str) -> Result<ConversationStatus, StoreError> {
    ConversationStatus::parse(value).ok_or_else(|| {
        StoreError::InvalidData(format!("unknown conversation status persisted: {value}"))
    })
}
