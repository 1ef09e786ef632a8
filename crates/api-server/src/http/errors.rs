use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::llm::LlmGatewayError;
use shared::models::ErrorResponse;
use shared::repos::StoreError;
use shared::session::ChatError;
use tracing::{error, warn};

pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

pub(super) fn missing_field_response(field: &str) -> Response {
    bad_request_response(format!("Missing required field: {field}"))
}

pub(super) fn unauthorized_response() -> Response {
    error_response(StatusCode::UNAUTHORIZED, "Unauthorized")
}

pub(super) fn forbidden_response(message: impl Into<String>) -> Response {
    error_response(StatusCode::FORBIDDEN, message)
}

pub(super) fn conflict_response(message: impl Into<String>) -> Response {
    error_response(StatusCode::CONFLICT, message)
}

pub(super) fn not_found_response(message: impl Into<String>) -> Response {
    error_response(StatusCode::NOT_FOUND, message)
}

pub(super) fn json_rejection_response(rejection: JsonRejection) -> Response {
    warn!("rejected request body: {rejection}");
    bad_request_response("Invalid JSON body")
}

pub(super) fn llm_error_response(err: &LlmGatewayError) -> Response {
    warn!(error_type = err.kind(), "llm request failed: {err}");
    error_response(StatusCode::BAD_GATEWAY, "Unable to connect to OpenAI services")
}

pub(super) fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::VersionConflict | StoreError::Duplicate => {
            conflict_response("Conversation was modified by another request; retry")
        }
        other => {
            error!("database operation failed: {other}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

pub(super) fn chat_error_response(err: ChatError) -> Response {
    match err {
        ChatError::Validation(message) => bad_request_response(message),
        ChatError::Forbidden => forbidden_response("You do not have access to this conversation"),
        ChatError::Ended => conflict_response("Conversation has already ended"),
        ChatError::Conflict => {
            conflict_response("Conversation was modified by another request; retry")
        }
        ChatError::Store(err) => store_error_response(err),
        ChatError::Llm(err) => llm_error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use shared::llm::LlmGatewayError;
    use shared::repos::StoreError;
    use shared::session::ChatError;

    use super::chat_error_response;

    #[test]
    fn chat_errors_map_to_status_classes() {
        let cases = [
            (ChatError::Validation("bad".to_string()), StatusCode::BAD_REQUEST),
            (ChatError::Forbidden, StatusCode::FORBIDDEN),
            (ChatError::Ended, StatusCode::CONFLICT),
            (ChatError::Conflict, StatusCode::CONFLICT),
            (
                ChatError::Store(StoreError::InvalidData("broken".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ChatError::Llm(LlmGatewayError::Timeout), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            assert_eq!(chat_error_response(err).status(), expected);
        }
    }
}
