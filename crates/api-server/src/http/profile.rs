use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use shared::models::UpdateProfileRequest;
use shared::repos::ProfilePatch;

use super::errors::{json_rejection_response, not_found_response, store_error_response};
use super::{AppState, AuthUser};

pub(super) async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    match state.store.get_profile(user.user_id).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => not_found_response("Profile not found"),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let patch = ProfilePatch {
        first_name: payload.first_name,
        last_name: payload.last_name,
        avatar_url: payload.avatar_url,
    };

    match state.store.update_profile(user.user_id, patch).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => not_found_response("Profile not found"),
        Err(err) => store_error_response(err),
    }
}
