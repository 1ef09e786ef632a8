use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::{
    FallbackReason, Feedback, FeedbackResolution, FeedbackSource, LlmGateway, LlmGatewayError,
    LlmGatewayRequest, LlmPurpose, feedback_prompt, generate_with_telemetry, log_llm_telemetry,
    persona_greeting, persona_prompt, render_transcript, resolve_feedback,
};
use crate::messages::{ChatMessage, Role};
use crate::models::{ChatRequest, ChatResponse, Conversation, ConversationStatus, non_blank};
use crate::repos::{ConversationStateUpdate, Datastore, NewConversation, StoreError};

pub mod transcript;
pub mod window;

pub use transcript::{human_turn_count, is_end_signal, is_substantive};
pub use window::trim_history;

const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub history_window: usize,
    pub min_human_turns: usize,
    pub end_trigger: String,
}

/// A validated `POST /api/chat` body.
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    pub session_id: String,
    pub prompt: Option<String>,
    pub employee_name: String,
    pub context: String,
    pub scenario_id: Option<Uuid>,
}

impl ChatTurnRequest {
    pub fn from_request(request: ChatRequest) -> Result<Self, ChatError> {
        let session_id = required_field(request.session_id, "sessionId")?;
        if !is_valid_session_id(&session_id) {
            return Err(ChatError::Validation("Invalid sessionId".to_string()));
        }

        let scenario_id = match non_blank(request.scenario_id) {
            Some(raw) => Some(
                Uuid::parse_str(&raw)
                    .map_err(|_| ChatError::Validation("Invalid scenarioId".to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            session_id,
            prompt: non_blank(request.prompt),
            employee_name: required_field(request.employee_name, "employeeName")?,
            context: required_field(request.context, "context")?,
            scenario_id,
        })
    }
}

#[derive(Debug, Clone)]
pub enum ChatOutcome {
    /// A new session was opened; carries the employee's greeting.
    Started { response: String },
    Reply { response: String },
    Feedback {
        feedback: Feedback,
        source: FeedbackSource,
        session_ended: bool,
    },
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        match outcome {
            ChatOutcome::Started { response } | ChatOutcome::Reply { response } => {
                ChatResponse::Reply { response }
            }
            ChatOutcome::Feedback { feedback, .. } => ChatResponse::Feedback { feedback },
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("conversation belongs to another user")]
    Forbidden,
    #[error("conversation has already ended")]
    Ended,
    #[error("conversation was modified concurrently")]
    Conflict,
    #[error("store failure: {0}")]
    Store(#[source] StoreError),
    #[error("llm failure: {0}")]
    Llm(#[source] LlmGatewayError),
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict | StoreError::Duplicate => Self::Conflict,
            other => Self::Store(other),
        }
    }
}

/// Runs one chat turn: load or create the session, branch on the end
/// trigger, call the model at most once, then write once.
#[derive(Clone)]
pub struct SessionController {
    store: Arc<dyn Datastore>,
    llm_gateway: Arc<dyn LlmGateway>,
    policy: SessionPolicy,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn Datastore>,
        llm_gateway: Arc<dyn LlmGateway>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            llm_gateway,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub async fn handle_turn(
        &self,
        user_id: Uuid,
        request: ChatTurnRequest,
    ) -> Result<ChatOutcome, ChatError> {
        let Some(conversation) = self.store.get_conversation(&request.session_id).await? else {
            return self.start_session(user_id, &request).await;
        };

        if conversation.user_id != user_id {
            return Err(ChatError::Forbidden);
        }
        if conversation.status == ConversationStatus::Ended {
            return Err(ChatError::Ended);
        }

        let prompt = request
            .prompt
            .clone()
            .ok_or_else(|| ChatError::Validation("Missing required field: prompt".to_string()))?;

        if is_end_signal(&prompt, &self.policy.end_trigger) {
            self.end_session(user_id, conversation).await
        } else {
            self.continue_session(user_id, &request, conversation, prompt)
                .await
        }
    }

    async fn start_session(
        &self,
        user_id: Uuid,
        request: &ChatTurnRequest,
    ) -> Result<ChatOutcome, ChatError> {
        let scenario_name = match request.scenario_id {
            Some(scenario_id) => {
                let scenario = self
                    .store
                    .get_scenario(scenario_id)
                    .await?
                    .filter(|scenario| scenario.user_id.is_none_or(|owner| owner == user_id))
                    .ok_or_else(|| ChatError::Validation("Unknown scenarioId".to_string()))?;
                Some(scenario.title)
            }
            None => None,
        };

        let greeting = persona_greeting(&request.employee_name);
        let messages = vec![
            ChatMessage::system(persona_prompt(
                &request.employee_name,
                &request.context,
                &self.policy.end_trigger,
            )),
            ChatMessage::ai(greeting.clone()),
        ];

        self.store
            .insert_conversation(NewConversation {
                id: request.session_id.clone(),
                user_id,
                scenario_id: request.scenario_id,
                name: scenario_name
                    .unwrap_or_else(|| format!("Conversation with {}", request.employee_name)),
                messages,
                feedback: None,
                status: ConversationStatus::Active,
            })
            .await?;

        info!(
            user_id = %user_id,
            session_id = request.session_id.as_str(),
            "chat session started"
        );
        Ok(ChatOutcome::Started { response: greeting })
    }

    async fn continue_session(
        &self,
        user_id: Uuid,
        request: &ChatTurnRequest,
        conversation: Conversation,
        prompt: String,
    ) -> Result<ChatOutcome, ChatError> {
        let mut messages = with_persona_head(conversation.messages, request, &self.policy);
        messages.push(ChatMessage::human(prompt));
        let mut messages = trim_history(messages, self.policy.history_window);

        let llm_request = LlmGatewayRequest::new(LlmPurpose::PersonaReply, messages.clone())
            .with_requester_id(user_id.to_string());
        let (result, telemetry) =
            generate_with_telemetry(self.llm_gateway.as_ref(), llm_request).await;
        log_llm_telemetry(user_id, Some(&conversation.id), &telemetry);
        let reply = result.map_err(ChatError::Llm)?.content.trim().to_string();

        messages.push(ChatMessage::ai(reply.clone()));
        let messages = trim_history(messages, self.policy.history_window);

        self.store
            .update_conversation_state(
                &conversation.id,
                conversation.version,
                ConversationStateUpdate {
                    messages,
                    feedback: None,
                    status: ConversationStatus::Active,
                },
            )
            .await?;

        Ok(ChatOutcome::Reply { response: reply })
    }

    async fn end_session(
        &self,
        user_id: Uuid,
        conversation: Conversation,
    ) -> Result<ChatOutcome, ChatError> {
        let human_turns = human_turn_count(&conversation.messages);
        if human_turns == 0 {
            return Ok(early_feedback(FallbackReason::NoHumanInput));
        }
        if human_turns < self.policy.min_human_turns {
            return Ok(early_feedback(FallbackReason::InsufficientTurns));
        }

        let resolution = if is_substantive(&conversation.messages) {
            let transcript = render_transcript(&conversation.messages);
            let llm_request = LlmGatewayRequest::new(
                LlmPurpose::FeedbackEvaluation,
                vec![ChatMessage::human(feedback_prompt(&transcript))],
            )
            .with_requester_id(user_id.to_string());
            let (result, telemetry) =
                generate_with_telemetry(self.llm_gateway.as_ref(), llm_request).await;
            log_llm_telemetry(user_id, Some(&conversation.id), &telemetry);
            let response = result.map_err(ChatError::Llm)?;
            resolve_feedback(Some(&response.content))
        } else {
            FeedbackResolution::fallback(FallbackReason::InsufficientContent)
        };

        if let FeedbackSource::Fallback(reason) = resolution.source {
            warn!(
                user_id = %user_id,
                session_id = conversation.id.as_str(),
                reason = reason.as_str(),
                "session ended with fallback feedback"
            );
        }

        self.store
            .update_conversation_state(
                &conversation.id,
                conversation.version,
                ConversationStateUpdate {
                    messages: conversation.messages,
                    feedback: Some(resolution.feedback.clone()),
                    status: ConversationStatus::Ended,
                },
            )
            .await?;

        info!(
            user_id = %user_id,
            session_id = conversation.id.as_str(),
            human_turns,
            "chat session ended"
        );
        Ok(ChatOutcome::Feedback {
            feedback: resolution.feedback,
            source: resolution.source,
            session_ended: true,
        })
    }
}

fn early_feedback(reason: FallbackReason) -> ChatOutcome {
    let resolution = FeedbackResolution::fallback(reason);
    ChatOutcome::Feedback {
        feedback: resolution.feedback,
        source: resolution.source,
        session_ended: false,
    }
}

/// Rows written before the persona prompt was stored lack a system head;
/// rebuild it from the request so trimming never loses the persona.
fn with_persona_head(
    messages: Vec<ChatMessage>,
    request: &ChatTurnRequest,
    policy: &SessionPolicy,
) -> Vec<ChatMessage> {
    if messages.first().is_some_and(|message| message.role == Role::System) {
        return messages;
    }

    let mut rebuilt = Vec::with_capacity(messages.len() + 1);
    rebuilt.push(ChatMessage::system(persona_prompt(
        &request.employee_name,
        &request.context,
        &policy.end_trigger,
    )));
    rebuilt.extend(messages);
    rebuilt
}

/// Replacement history for a stored conversation. When the stored history
/// starts with a persona prompt, that prompt stays first and any system turns
/// leading the replacement are dropped.
pub fn keep_persona_head(
    stored: &[ChatMessage],
    replacement: Vec<ChatMessage>,
) -> Vec<ChatMessage> {
    let Some(head) = stored.first().filter(|message| message.role == Role::System) else {
        return replacement;
    };

    let mut kept = Vec::with_capacity(replacement.len() + 1);
    kept.push(head.clone());
    kept.extend(
        replacement
            .into_iter()
            .skip_while(|message| message.role == Role::System),
    );
    kept
}

pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':'))
}

fn required_field(value: Option<String>, name: &str) -> Result<String, ChatError> {
    non_blank(value)
        .ok_or_else(|| ChatError::Validation(format!("Missing required field: {name}")))
}
