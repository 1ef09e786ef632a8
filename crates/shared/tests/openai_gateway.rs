use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::llm::{
    LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmPurpose, OpenAiGateway,
    OpenAiGatewayConfig,
};
use shared::messages::ChatMessage;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
    request_id_header: Option<&'static str>,
    delay: Option<Duration>,
}

impl MockReply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            request_id_header: None,
            delay: None,
        }
    }
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_payloads: Arc<Mutex<Vec<Value>>>,
    seen_auth_headers: Arc<Mutex<Vec<String>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_payloads: Arc::new(Mutex::new(Vec::new())),
            seen_auth_headers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn sends_mapped_roles_and_parses_text_response() {
    let state = TestServerState::with_replies(vec![MockReply {
        request_id_header: Some("req-header"),
        ..MockReply::ok(success_response_body("gpt-4.1-2025-04-14", "I hear you."))
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = OpenAiGateway::new(config_for(url, 2_000)).expect("gateway should build");
    let response = gateway
        .generate(persona_request())
        .await
        .expect("response should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(response.content, "I hear you.");
    assert_eq!(response.model, "gpt-4.1-2025-04-14");
    assert_eq!(response.provider_request_id.as_deref(), Some("req-header"));
    let usage = response.usage.expect("usage should be present");
    assert_eq!(usage.total_tokens, 20);

    let payloads = state.seen_payloads.lock().await.clone();
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload["model"], "gpt-4.1");
    assert_eq!(payload["user"], "user-1");
    let roles = payload["messages"]
        .as_array()
        .expect("messages should be an array")
        .iter()
        .map(|message| message["role"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(roles, vec!["system", "assistant", "user"]);

    let seen_auth_headers = state.seen_auth_headers.lock().await.clone();
    assert_eq!(seen_auth_headers, vec!["Bearer test-openai-key".to_string()]);
}

#[tokio::test]
async fn falls_back_to_body_id_when_header_is_missing() {
    let state = TestServerState::with_replies(vec![MockReply::ok(success_response_body(
        "gpt-4.1", "Okay.",
    ))]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = OpenAiGateway::new(config_for(url, 2_000)).expect("gateway should build");
    let response = gateway
        .generate(persona_request())
        .await
        .expect("response should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(response.provider_request_id.as_deref(), Some("chatcmpl-123"));
}

#[tokio::test]
async fn provider_errors_are_not_retried() {
    let state = TestServerState::with_replies(vec![
        MockReply {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: json!({ "error": { "code": "overloaded" } }),
            request_id_header: None,
            delay: None,
        },
        MockReply::ok(success_response_body("gpt-4.1", "never reached")),
    ]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = OpenAiGateway::new(config_for(url, 2_000)).expect("gateway should build");
    let err = gateway
        .generate(persona_request())
        .await
        .expect_err("provider failure should surface");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    match err {
        LlmGatewayError::ProviderFailure(detail) => {
            assert_eq!(detail, "status=503 code=overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(state.seen_payloads.lock().await.len(), 1);
}

#[tokio::test]
async fn missing_choices_is_an_invalid_payload() {
    let state = TestServerState::with_replies(vec![MockReply::ok(json!({
        "id": "chatcmpl-1",
        "model": "gpt-4.1",
        "choices": []
    }))]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = OpenAiGateway::new(config_for(url, 2_000)).expect("gateway should build");
    let err = gateway
        .generate(persona_request())
        .await
        .expect_err("empty choices should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(matches!(err, LlmGatewayError::InvalidProviderPayload(_)));
}

#[tokio::test]
async fn slow_provider_times_out() {
    let state = TestServerState::with_replies(vec![MockReply {
        delay: Some(Duration::from_millis(500)),
        ..MockReply::ok(success_response_body("gpt-4.1", "too late"))
    }]);
    let (url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = OpenAiGateway::new(config_for(url, 50)).expect("gateway should build");
    let err = gateway
        .generate(persona_request())
        .await
        .expect_err("slow provider should time out");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(matches!(err, LlmGatewayError::Timeout));
}

fn config_for(url: String, timeout_ms: u64) -> OpenAiGatewayConfig {
    OpenAiGatewayConfig {
        chat_completions_url: url,
        api_key: "test-openai-key".to_string(),
        model: "gpt-4.1".to_string(),
        timeout_ms,
    }
}

fn persona_request() -> LlmGatewayRequest {
    LlmGatewayRequest::new(
        LlmPurpose::PersonaReply,
        vec![
            ChatMessage::system("You are Jamie."),
            ChatMessage::ai("Hello, I'm Jamie."),
            ChatMessage::human("Let's talk about deadlines."),
        ],
    )
    .with_requester_id("user-1")
}

fn success_response_body(model: &str, content: &str) -> Value {
    json!({
        "id": "chatcmpl-123",
        "model": model,
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 12,
            "completion_tokens": 8,
            "total_tokens": 20
        }
    })
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/v1/chat/completions", post(test_chat_completions_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (
        format!("http://{local_addr}/v1/chat/completions"),
        shutdown_tx,
        server_task,
    )
}

async fn test_chat_completions_handler(
    State(state): State<TestServerState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    state.seen_payloads.lock().await.push(payload);

    if let Some(value) = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
    {
        state.seen_auth_headers.lock().await.push(value.to_string());
    }

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({
            "error": {
                "code": "exhausted_test_replies"
            }
        }),
        request_id_header: None,
        delay: None,
    });

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response_headers = HeaderMap::new();
    if let Some(request_id) = reply.request_id_header {
        response_headers.insert("x-request-id", HeaderValue::from_static(request_id));
    }

    (reply.status, response_headers, Json(reply.body))
}
