pub mod contracts;
pub mod fallback;
pub mod gateway;
pub mod observability;
pub mod openai;
pub mod prompts;
pub mod validation;

pub use contracts::{Feedback, FeedbackContract, ScoredDimension, feedback_schema};
pub use fallback::{
    FallbackReason, FeedbackResolution, FeedbackSource, fallback_feedback, resolve_feedback,
};
pub use gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
    LlmPurpose, LlmTokenUsage,
};
pub use observability::{LlmTelemetryEvent, generate_with_telemetry, log_llm_telemetry};
pub use openai::{OpenAiGateway, OpenAiGatewayConfig};
pub use prompts::{
    COACH_SYSTEM_PROMPT, feedback_prompt, persona_greeting, persona_prompt, render_transcript,
};
pub use validation::{FeedbackParseError, extract_json_block, parse_feedback};
