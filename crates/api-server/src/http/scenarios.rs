use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{
    CreateScenarioRequest, Scenario, SuccessResponse, TipsInput, UpdateScenarioRequest, non_blank,
};
use shared::repos::{NewScenario, ScenarioPatch};
use uuid::Uuid;

use super::errors::{
    bad_request_response, forbidden_response, json_rejection_response, missing_field_response,
    not_found_response, store_error_response,
};
use super::{AppState, AuthUser};

const SCENARIO_NOT_FOUND: &str = "Scenario not found";

pub(super) async fn list_scenarios(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    match state.store.list_scenarios(user.user_id).await {
        Ok(scenarios) => Json(scenarios).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn create_scenario(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateScenarioRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let Some(title) = non_blank(payload.title) else {
        return missing_field_response("title");
    };
    let Some(description) = non_blank(payload.description) else {
        return missing_field_response("description");
    };
    let Some(context) = non_blank(payload.context) else {
        return missing_field_response("context");
    };
    let Some(employee_name) = non_blank(payload.employee_name) else {
        return missing_field_response("employee_name");
    };
    let tips = match payload.tips {
        None => return missing_field_response("tips"),
        Some(TipsInput::Encoded(raw)) if raw.trim().is_empty() => {
            return missing_field_response("tips");
        }
        Some(tips) => match tips.into_tips() {
            Ok(tips) => tips,
            Err(message) => return bad_request_response(message),
        },
    };

    let employee_avatar =
        non_blank(payload.employee_avatar).unwrap_or_else(|| avatar_initial(&employee_name));

    match state
        .store
        .insert_scenario(NewScenario {
            user_id: user.user_id,
            title,
            description,
            context,
            employee_name,
            employee_avatar,
            tips,
        })
        .await
    {
        Ok(scenario) => (StatusCode::CREATED, Json(scenario)).into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn get_scenario(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(scenario_id): Path<String>,
) -> Response {
    let scenario = match load_scenario(&state, &scenario_id).await {
        Ok(scenario) => scenario,
        Err(response) => return response,
    };

    if !is_visible_to(&scenario, user.user_id) {
        return forbidden_response("You do not have access to this scenario");
    }

    Json(scenario).into_response()
}

pub(super) async fn update_scenario(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(scenario_id): Path<String>,
    payload: Result<Json<UpdateScenarioRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return json_rejection_response(rejection),
    };

    let scenario = match load_scenario(&state, &scenario_id).await {
        Ok(scenario) => scenario,
        Err(response) => return response,
    };
    if scenario.user_id.is_none() {
        return forbidden_response("Cannot modify default scenarios");
    }
    if scenario.user_id != Some(user.user_id) {
        return forbidden_response("You do not have access to this scenario");
    }

    let tips = match payload.tips.map(TipsInput::into_tips).transpose() {
        Ok(tips) => tips,
        Err(message) => return bad_request_response(message),
    };

    let patch = ScenarioPatch {
        title: non_blank(payload.title),
        description: non_blank(payload.description),
        context: non_blank(payload.context),
        employee_name: non_blank(payload.employee_name),
        employee_avatar: non_blank(payload.employee_avatar),
        tips,
    };

    match state.store.update_scenario(scenario.id, patch).await {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => not_found_response(SCENARIO_NOT_FOUND),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn delete_scenario(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(scenario_id): Path<String>,
) -> Response {
    let scenario = match load_scenario(&state, &scenario_id).await {
        Ok(scenario) => scenario,
        Err(response) => return response,
    };
    if scenario.user_id.is_none() {
        return forbidden_response("Cannot delete default scenarios");
    }
    if scenario.user_id != Some(user.user_id) {
        return forbidden_response("You do not have access to this scenario");
    }

    match state.store.delete_scenario(scenario.id).await {
        Ok(true) => Json(SuccessResponse { success: true }).into_response(),
        Ok(false) => not_found_response(SCENARIO_NOT_FOUND),
        Err(err) => store_error_response(err),
    }
}

async fn load_scenario(state: &AppState, raw_id: &str) -> Result<Scenario, Response> {
    let Ok(scenario_id) = Uuid::parse_str(raw_id.trim()) else {
        return Err(not_found_response(SCENARIO_NOT_FOUND));
    };

    match state.store.get_scenario(scenario_id).await {
        Ok(Some(scenario)) => Ok(scenario),
        Ok(None) => Err(not_found_response(SCENARIO_NOT_FOUND)),
        Err(err) => Err(store_error_response(err)),
    }
}

pub(super) fn is_visible_to(scenario: &Scenario, user_id: Uuid) -> bool {
    !scenario.is_custom || scenario.user_id == Some(user_id)
}

fn avatar_initial(employee_name: &str) -> String {
    employee_name
        .chars()
        .next()
        .map(|initial| initial.to_uppercase().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::avatar_initial;

    #[test]
    fn avatar_defaults_to_upper_cased_initial() {
        assert_eq!(avatar_initial("jamie"), "J");
        assert_eq!(avatar_initial("élodie"), "É");
        assert_eq!(avatar_initial(""), "");
    }
}
