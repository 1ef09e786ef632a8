use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Conversation, ConversationListItem, Profile, Scenario, ScenarioTitle, non_blank,
};

use super::{
    ConversationPatch, ConversationStateUpdate, ConversationStore, Datastore, NewConversation,
    NewScenario, ProfilePatch, ProfileStore, ScenarioPatch, ScenarioStore, StoreError,
    StoreFuture,
};

#[derive(Default)]
struct MemoryState {
    conversations: Vec<Conversation>,
    scenarios: Vec<Scenario>,
    profiles: Vec<Profile>,
}

/// In-process datastore with the same semantics as [`super::PgStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the database were unreachable.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn seed_scenario(&self, scenario: Scenario) {
        self.state.write().await.scenarios.push(scenario);
    }

    pub async fn seed_conversation(&self, conversation: Conversation) {
        self.state.write().await.conversations.push(conversation);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

impl ConversationStore for MemoryStore {
    fn get_conversation<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<Conversation>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.read().await;
            Ok(state
                .conversations
                .iter()
                .find(|conversation| conversation.id == id)
                .cloned())
        })
    }

    fn insert_conversation<'a>(
        &'a self,
        conversation: NewConversation,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            if state
                .conversations
                .iter()
                .any(|existing| existing.id == conversation.id)
            {
                return Err(StoreError::Duplicate);
            }

            let now = Utc::now();
            let created = Conversation {
                id: conversation.id,
                user_id: conversation.user_id,
                scenario_id: conversation.scenario_id,
                name: conversation.name,
                messages: conversation.messages,
                feedback: conversation.feedback,
                status: conversation.status,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            state.conversations.push(created.clone());
            Ok(created)
        })
    }

    fn update_conversation_state<'a>(
        &'a self,
        id: &'a str,
        expected_version: i64,
        update: ConversationStateUpdate,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            let conversation = state
                .conversations
                .iter_mut()
                .find(|conversation| conversation.id == id && conversation.version == expected_version)
                .ok_or(StoreError::VersionConflict)?;

            conversation.messages = update.messages;
            conversation.feedback = update.feedback;
            conversation.status = update.status;
            conversation.version += 1;
            conversation.updated_at = Utc::now();
            Ok(conversation.clone())
        })
    }

    fn patch_conversation<'a>(
        &'a self,
        id: &'a str,
        expected_version: i64,
        patch: ConversationPatch,
    ) -> StoreFuture<'a, Conversation> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            let Some(conversation) = state.conversations.iter_mut().find(|conversation| {
                conversation.id == id && conversation.version == expected_version
            }) else {
                return Err(StoreError::VersionConflict);
            };

            if let Some(name) = patch.name {
                conversation.name = name;
            }
            if let Some(messages) = patch.messages {
                conversation.messages = messages;
            }
            if let Some(feedback) = patch.feedback {
                conversation.feedback = Some(feedback);
            }
            if let Some(status) = patch.status {
                conversation.status = status;
            }
            conversation.version += 1;
            conversation.updated_at = Utc::now();
            Ok(conversation.clone())
        })
    }

    fn list_conversations<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<ConversationListItem>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.read().await;
            let mut items = state
                .conversations
                .iter()
                .rev()
                .filter(|conversation| conversation.user_id == user_id)
                .map(|conversation| ConversationListItem {
                    conversation: conversation.clone(),
                    scenarios: conversation.scenario_id.and_then(|scenario_id| {
                        state
                            .scenarios
                            .iter()
                            .find(|scenario| scenario.id == scenario_id)
                            .map(|scenario| ScenarioTitle {
                                title: scenario.title.clone(),
                            })
                    }),
                })
                .collect::<Vec<_>>();
            items.sort_by(|left, right| {
                right
                    .conversation
                    .created_at
                    .cmp(&left.conversation.created_at)
            });
            Ok(items)
        })
    }

    fn delete_conversation<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            let before = state.conversations.len();
            state.conversations.retain(|conversation| conversation.id != id);
            Ok(state.conversations.len() < before)
        })
    }
}

impl ScenarioStore for MemoryStore {
    fn list_scenarios<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Scenario>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.read().await;
            let mut scenarios = state
                .scenarios
                .iter()
                .filter(|scenario| scenario.user_id.is_none() || scenario.user_id == Some(user_id))
                .cloned()
                .collect::<Vec<_>>();
            scenarios.sort_by(|left, right| left.created_at.cmp(&right.created_at));
            Ok(scenarios)
        })
    }

    fn get_scenario<'a>(&'a self, id: Uuid) -> StoreFuture<'a, Option<Scenario>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.read().await;
            Ok(state.scenarios.iter().find(|scenario| scenario.id == id).cloned())
        })
    }

    fn insert_scenario<'a>(&'a self, scenario: NewScenario) -> StoreFuture<'a, Scenario> {
        Box::pin(async move {
            self.check_available()?;
            let now = Utc::now();
            let created = Scenario {
                id: Uuid::new_v4(),
                user_id: Some(scenario.user_id),
                title: scenario.title,
                description: scenario.description,
                context: scenario.context,
                employee_name: scenario.employee_name,
                employee_avatar: scenario.employee_avatar,
                tips: scenario.tips,
                is_custom: true,
                created_at: now,
                updated_at: now,
            };
            self.state.write().await.scenarios.push(created.clone());
            Ok(created)
        })
    }

    fn update_scenario<'a>(
        &'a self,
        id: Uuid,
        patch: ScenarioPatch,
    ) -> StoreFuture<'a, Option<Scenario>> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            let Some(scenario) = state.scenarios.iter_mut().find(|scenario| scenario.id == id)
            else {
                return Ok(None);
            };

            if let Some(title) = patch.title {
                scenario.title = title;
            }
            if let Some(description) = patch.description {
                scenario.description = description;
            }
            if let Some(context) = patch.context {
                scenario.context = context;
            }
            if let Some(employee_name) = patch.employee_name {
                scenario.employee_name = employee_name;
            }
            if let Some(employee_avatar) = patch.employee_avatar {
                scenario.employee_avatar = employee_avatar;
            }
            if let Some(tips) = patch.tips {
                scenario.tips = tips;
            }
            scenario.updated_at = Utc::now();
            Ok(Some(scenario.clone()))
        })
    }

    fn delete_scenario<'a>(&'a self, id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            let before = state.scenarios.len();
            state.scenarios.retain(|scenario| scenario.id != id);
            let removed = state.scenarios.len() < before;
            if removed {
                for conversation in &mut state.conversations {
                    if conversation.scenario_id == Some(id) {
                        conversation.scenario_id = None;
                    }
                }
            }
            Ok(removed)
        })
    }
}

impl ProfileStore for MemoryStore {
    fn ensure_profile<'a>(&'a self, user_id: Uuid, email: Option<&'a str>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            match state.profiles.iter_mut().find(|profile| profile.id == user_id) {
                Some(profile) => {
                    if let Some(email) = email {
                        profile.email = Some(email.to_string());
                    }
                }
                None => {
                    let now = Utc::now();
                    state.profiles.push(Profile {
                        id: user_id,
                        email: email.map(ToString::to_string),
                        first_name: None,
                        last_name: None,
                        avatar_url: None,
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
            Ok(())
        })
    }

    fn get_profile<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Option<Profile>> {
        Box::pin(async move {
            self.check_available()?;
            let state = self.state.read().await;
            Ok(state.profiles.iter().find(|profile| profile.id == user_id).cloned())
        })
    }

    fn update_profile<'a>(
        &'a self,
        user_id: Uuid,
        patch: ProfilePatch,
    ) -> StoreFuture<'a, Option<Profile>> {
        Box::pin(async move {
            self.check_available()?;
            let mut state = self.state.write().await;
            let Some(profile) = state.profiles.iter_mut().find(|profile| profile.id == user_id)
            else {
                return Ok(None);
            };

            if let Some(first_name) = non_blank(patch.first_name) {
                profile.first_name = Some(first_name);
            }
            if let Some(last_name) = non_blank(patch.last_name) {
                profile.last_name = Some(last_name);
            }
            if let Some(avatar_url) = non_blank(patch.avatar_url) {
                profile.avatar_url = Some(avatar_url);
            }
            profile.updated_at = Utc::now();
            Ok(Some(profile.clone()))
        })
    }
}

impl Datastore for MemoryStore {
    fn ping<'a>(&'a self) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.check_available() })
    }
}
