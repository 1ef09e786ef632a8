use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::config::AuthConfig;
use shared::llm::LlmGateway;
use shared::repos::Datastore;
use shared::session::{SessionController, SessionPolicy};
use uuid::Uuid;

mod authn;
mod chat;
mod conversations;
mod errors;
mod health;
mod observability;
mod profile;
mod prompts;
mod scenarios;
mod supabase_identity;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Datastore>,
    pub llm_gateway: Arc<dyn LlmGateway>,
    pub sessions: SessionController,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Datastore>,
        llm_gateway: Arc<dyn LlmGateway>,
        auth: AuthConfig,
        session_policy: SessionPolicy,
    ) -> Self {
        let sessions = SessionController::new(store.clone(), llm_gateway.clone(), session_policy);
        Self {
            store,
            llm_gateway,
            sessions,
            auth,
        }
    }
}

#[derive(Clone, Copy)]
pub(super) struct AuthUser {
    pub(super) user_id: Uuid,
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .with_state(app_state.clone());

    let auth_layer_state = app_state.clone();

    let protected_routes = Router::new()
        .route("/api/chat", post(chat::post_chat))
        .route("/api/prompts", post(prompts::post_prompt))
        .route(
            "/api/scenarios",
            get(scenarios::list_scenarios).post(scenarios::create_scenario),
        )
        .route(
            "/api/scenarios/{scenario_id}",
            get(scenarios::get_scenario)
                .patch(scenarios::update_scenario)
                .delete(scenarios::delete_scenario),
        )
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/conversations/{conversation_id}",
            get(conversations::get_conversation)
                .patch(conversations::update_conversation)
                .delete(conversations::delete_conversation),
        )
        .route(
            "/api/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        .layer(middleware::from_fn_with_state(
            auth_layer_state,
            authn::auth_middleware,
        ))
        .with_state(app_state);

    public_routes
        .merge(protected_routes)
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
}
