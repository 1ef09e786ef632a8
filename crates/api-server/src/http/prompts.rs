use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use shared::llm::{
    COACH_SYSTEM_PROMPT, LlmGatewayRequest, LlmPurpose, generate_with_telemetry,
    log_llm_telemetry,
};
use shared::messages::ChatMessage;
use shared::models::{PromptRequest, PromptResponse};

use super::errors::{json_rejection_response, llm_error_response, missing_field_response};
use super::{AppState, AuthUser};

pub(super) async fn post_prompt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<PromptRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let Some(prompt) = payload
        .prompt
        .map(|prompt| prompt.trim().to_string())
        .filter(|prompt| !prompt.is_empty())
    else {
        return missing_field_response("prompt");
    };

    let request = LlmGatewayRequest::new(
        LlmPurpose::CoachingPrompt,
        vec![
            ChatMessage::system(COACH_SYSTEM_PROMPT),
            ChatMessage::human(prompt),
        ],
    )
    .with_requester_id(user.user_id.to_string());

    let (result, telemetry) = generate_with_telemetry(state.llm_gateway.as_ref(), request).await;
    log_llm_telemetry(user.user_id, None, &telemetry);

    match result {
        Ok(response) => Json(PromptResponse {
            response: response.content.trim().to_string(),
        })
        .into_response(),
        Err(err) => llm_error_response(&err),
    }
}
