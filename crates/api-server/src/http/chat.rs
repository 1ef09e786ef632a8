use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use shared::models::{ChatRequest, ChatResponse};
use shared::session::{ChatError, ChatTurnRequest};
use tracing::warn;

use super::errors::{chat_error_response, json_rejection_response};
use super::observability::RequestContext;
use super::{AppState, AuthUser};

pub(super) async fn post_chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(request_context): Extension<RequestContext>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let request = match ChatTurnRequest::from_request(payload) {
        Ok(request) => request,
        Err(err) => return chat_error_response(err),
    };

    match state.sessions.handle_turn(user.user_id, request).await {
        Ok(outcome) => Json(ChatResponse::from(outcome)).into_response(),
        Err(err) => {
            if !matches!(err, ChatError::Validation(_)) {
                warn!(
                    request_id = %request_context.request_id,
                    user_id = %user.user_id,
                    "chat turn failed: {err}"
                );
            }
            chat_error_response(err)
        }
    }
}
