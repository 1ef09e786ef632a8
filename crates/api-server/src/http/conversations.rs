use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{
    Conversation, ConversationDetail, ConversationStatus, CreateConversationRequest,
    SuccessResponse, UpdateConversationRequest, non_blank,
};
use shared::repos::{ConversationPatch, NewConversation};
use shared::session::{is_valid_session_id, keep_persona_head};
use uuid::Uuid;

use super::errors::{
    bad_request_response, conflict_response, forbidden_response, json_rejection_response,
    missing_field_response, not_found_response, store_error_response,
};
use super::scenarios::is_visible_to;
use super::{AppState, AuthUser};

const CONVERSATION_NOT_FOUND: &str = "Conversation not found";

pub(super) async fn list_conversations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    match state.store.list_conversations(user.user_id).await {
        Ok(conversations) => Json(conversations).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn create_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateConversationRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let Some(raw_scenario_id) = non_blank(payload.scenario_id) else {
        return missing_field_response("scenario_id");
    };
    let Some(name) = non_blank(payload.name) else {
        return missing_field_response("name");
    };
    let Ok(scenario_id) = Uuid::parse_str(&raw_scenario_id) else {
        return bad_request_response("Invalid scenario_id");
    };

    match state.store.get_scenario(scenario_id).await {
        Ok(Some(scenario)) if is_visible_to(&scenario, user.user_id) => {}
        Ok(_) => return bad_request_response("Unknown scenario_id"),
        Err(err) => return store_error_response(err),
    }

    let status = if payload.feedback.is_some() {
        ConversationStatus::Ended
    } else {
        ConversationStatus::Active
    };

    match state
        .store
        .insert_conversation(NewConversation {
            id: Uuid::new_v4().to_string(),
            user_id: user.user_id,
            scenario_id: Some(scenario_id),
            name,
            messages: payload.messages.unwrap_or_default(),
            feedback: payload.feedback,
            status,
        })
        .await
    {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn get_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Response {
    let conversation = match load_owned_conversation(&state, user, &conversation_id).await {
        Ok(conversation) => conversation,
        Err(response) => return response,
    };

    let scenario = match conversation.scenario_id {
        Some(scenario_id) => match state.store.get_scenario(scenario_id).await {
            Ok(scenario) => scenario,
            Err(err) => return store_error_response(err),
        },
        None => None,
    };

    Json(ConversationDetail {
        conversation,
        scenarios: scenario,
    })
    .into_response()
}

pub(super) async fn update_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
    payload: Result<Json<UpdateConversationRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let conversation = match load_owned_conversation(&state, user, &conversation_id).await {
        Ok(conversation) => conversation,
        Err(response) => return response,
    };

    let rewrites_session = payload.messages.is_some() || payload.feedback.is_some();
    if rewrites_session && conversation.status == ConversationStatus::Ended {
        return conflict_response("Conversation has already ended");
    }
    if payload.feedback.is_some() && conversation.feedback.is_some() {
        return conflict_response("Feedback has already been recorded");
    }

    let patch = ConversationPatch {
        name: non_blank(payload.name),
        messages: payload
            .messages
            .map(|messages| keep_persona_head(&conversation.messages, messages)),
        status: payload.feedback.as_ref().map(|_| ConversationStatus::Ended),
        feedback: payload.feedback,
    };

    match state
        .store
        .patch_conversation(&conversation.id, conversation.version, patch)
        .await
    {
        Ok(updated) => Json(updated).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn delete_conversation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(conversation_id): Path<String>,
) -> Response {
    let conversation = match load_owned_conversation(&state, user, &conversation_id).await {
        Ok(conversation) => conversation,
        Err(response) => return response,
    };

    match state.store.delete_conversation(&conversation.id).await {
        Ok(true) => Json(SuccessResponse { success: true }).into_response(),
        Ok(false) => not_found_response(CONVERSATION_NOT_FOUND),
        Err(err) => store_error_response(err),
    }
}

async fn load_owned_conversation(
    state: &AppState,
    user: AuthUser,
    conversation_id: &str,
) -> Result<Conversation, Response> {
    if !is_valid_session_id(conversation_id) {
        return Err(not_found_response(CONVERSATION_NOT_FOUND));
    }

    match state.store.get_conversation(conversation_id).await {
        Ok(Some(conversation)) if conversation.user_id == user.user_id => Ok(conversation),
        Ok(Some(_)) => Err(forbidden_response(
            "You do not have access to this conversation",
        )),
        Ok(None) => Err(not_found_response(CONVERSATION_NOT_FOUND)),
        Err(err) => Err(store_error_response(err)),
    }
}
