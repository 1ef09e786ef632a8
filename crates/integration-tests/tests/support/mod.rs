#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use api_server::http::{AppState, build_router};
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use serde_json::{Value, json};
use shared::config::AuthConfig;
use shared::llm::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
};
use shared::models::Scenario;
use shared::repos::MemoryStore;
use shared::session::SessionPolicy;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_JWT_SECRET: &str = "integration-test-jwt-secret-with-enough-length";
const TEST_AUDIENCE: &str = "authenticated";

pub const JAMIE_SCENARIO_ID: Uuid = Uuid::from_u128(0x6f2c1a528d8e4f579a530f5e8b1d0a01);

#[derive(Clone, Default)]
pub struct ScriptedGateway {
    replies: Arc<Mutex<VecDeque<Result<String, LlmGatewayError>>>>,
    requests: Arc<Mutex<Vec<LlmGatewayRequest>>>,
}

impl ScriptedGateway {
    pub async fn push_reply(&self, content: &str) {
        self.replies.lock().await.push_back(Ok(content.to_string()));
    }

    pub async fn push_failure(&self, err: LlmGatewayError) {
        self.replies.lock().await.push_back(Err(err));
    }

    pub async fn requests(&self) -> Vec<LlmGatewayRequest> {
        self.requests.lock().await.clone()
    }
}

impl LlmGateway for ScriptedGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            self.requests.lock().await.push(request);
            let reply = self
                .replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(LlmGatewayError::ProviderFailure("no_reply".to_string())));

            reply.map(|content| LlmGatewayResponse {
                model: "gpt-4.1".to_string(),
                provider_request_id: Some("req-test".to_string()),
                content,
                usage: None,
            })
        })
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub store: MemoryStore,
    pub gateway: ScriptedGateway,
}

pub async fn test_app() -> TestApp {
    let store = MemoryStore::new();
    store.seed_scenario(jamie_scenario()).await;
    let gateway = ScriptedGateway::default();

    let state = AppState::new(
        Arc::new(store.clone()),
        Arc::new(gateway.clone()),
        AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            jwt_audience: TEST_AUDIENCE.to_string(),
            jwt_issuer: None,
        },
        SessionPolicy::default(),
    );

    TestApp {
        router: build_router(state),
        store,
        gateway,
    }
}

pub fn jamie_scenario() -> Scenario {
    let now = Utc::now();
    Scenario {
        id: JAMIE_SCENARIO_ID,
        user_id: None,
        title: "Addressing Performance Issues".to_string(),
        description: "Jamie has been missing deadlines.".to_string(),
        context: "Jamie is a developer who has missed three deadlines this month.".to_string(),
        employee_name: "Jamie".to_string(),
        employee_avatar: "J".to_string(),
        tips: vec!["Be specific about the missed deadlines".to_string()],
        is_custom: false,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug, Serialize)]
struct TestClaims {
    sub: String,
    aud: String,
    email: String,
    iat: i64,
    exp: i64,
}

pub fn bearer_for(user_id: Uuid) -> String {
    let now = Utc::now();
    let claims = TestClaims {
        sub: user_id.to_string(),
        aud: TEST_AUDIENCE.to_string(),
        email: format!("{user_id}@example.test"),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(5)).timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("test token should encode");

    format!("Bearer {token}")
}

pub struct JsonResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn send_json(app: &axum::Router, request: Request<Body>) -> JsonResponse {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request should succeed");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should read");
    let body = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));

    JsonResponse { status, body }
}

pub fn request(
    method: Method,
    path: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::ACCEPT, "application/json");

    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, token);
    }

    let request_body = body
        .map(|value| {
            serde_json::to_vec(&value).expect("json body should serialize for integration request")
        })
        .unwrap_or_default();
    if !request_body.is_empty() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }

    builder
        .body(Body::from(request_body))
        .expect("integration request should build")
}

pub fn error_message(body: &Value) -> Option<&str> {
    body.get("error")?.as_str()
}
