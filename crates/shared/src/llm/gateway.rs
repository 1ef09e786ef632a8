use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::ChatMessage;

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LlmGatewayResponse, LlmGatewayError>> + Send + 'a>>;

/// Why a completion is requested; drives telemetry labels and sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmPurpose {
    PersonaReply,
    FeedbackEvaluation,
    CoachingPrompt,
}

impl LlmPurpose {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PersonaReply => "persona_reply",
            Self::FeedbackEvaluation => "feedback_evaluation",
            Self::CoachingPrompt => "coaching_prompt",
        }
    }

    pub const fn temperature(self) -> f32 {
        match self {
            Self::PersonaReply => 0.7,
            Self::FeedbackEvaluation => 0.0,
            Self::CoachingPrompt => 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmGatewayRequest {
    pub requester_id: Option<String>,
    pub purpose: LlmPurpose,
    pub messages: Vec<ChatMessage>,
}

impl LlmGatewayRequest {
    pub fn new(purpose: LlmPurpose, messages: Vec<ChatMessage>) -> Self {
        Self {
            requester_id: None,
            purpose,
            messages,
        }
    }

    pub fn with_requester_id(mut self, requester_id: impl AsRef<str>) -> Self {
        let trimmed = requester_id.as_ref().trim();
        if !trimmed.is_empty() {
            self.requester_id = Some(trimmed.to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGatewayResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    pub content: String,
    pub usage: Option<LlmTokenUsage>,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

impl LlmGatewayError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ProviderFailure(_) => "provider_failure",
            Self::InvalidProviderPayload(_) => "invalid_provider_payload",
        }
    }
}

/// Text-completion collaborator: ordered role-tagged messages in, generated text out.
pub trait LlmGateway: Send + Sync {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a>;
}

#[cfg(test)]
mod tests {
    use super::{LlmGatewayRequest, LlmPurpose};
    use crate::messages::ChatMessage;

    #[test]
    fn requester_id_is_trimmed_and_blank_ids_are_ignored() {
        let request = LlmGatewayRequest::new(LlmPurpose::PersonaReply, vec![ChatMessage::human("hi")])
            .with_requester_id("  user-1  ");
        assert_eq!(request.requester_id.as_deref(), Some("user-1"));

        let request = LlmGatewayRequest::new(LlmPurpose::PersonaReply, Vec::new())
            .with_requester_id("   ");
        assert!(request.requester_id.is_none());
    }

    #[test]
    fn feedback_evaluation_is_deterministic() {
        assert_eq!(LlmPurpose::FeedbackEvaluation.temperature(), 0.0);
        assert!(LlmPurpose::PersonaReply.temperature() > 0.0);
    }
}
