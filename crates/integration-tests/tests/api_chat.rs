mod support;

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};
use shared::llm::{LlmGatewayError, LlmPurpose};
use shared::messages::Role;
use shared::models::ConversationStatus;
use shared::repos::ConversationStore;
use uuid::Uuid;

use support::{JAMIE_SCENARIO_ID, bearer_for, error_message, request, send_json, test_app};

const EVALUATOR_REPLY: &str = r#"```json
{
  "sbi_usage": { "score": 70, "description": "Described the missed deadlines and their impact." },
  "action_plan": { "score": 55, "description": "Proposed weekly check-ins." },
  "balance": { "score": 85, "description": "Recognised Jamie's code quality." },
  "overall": ["Solid conversation", "Agree on concrete dates next time"]
}
```"#;

fn chat_body(session_id: &str, prompt: Option<&str>) -> Value {
    let mut body = json!({
        "sessionId": session_id,
        "employeeName": "Jamie",
        "context": "Jamie is a developer who has missed three deadlines this month.",
        "scenarioId": JAMIE_SCENARIO_ID.to_string(),
    });
    if let Some(prompt) = prompt {
        body["prompt"] = json!(prompt);
    }
    body
}

#[tokio::test]
async fn chat_requires_a_bearer_token() {
    let app = test_app().await;

    let response = send_json(
        &app.router,
        request(Method::POST, "/api/chat", None, Some(chat_body("s1", None))),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&response.body), Some("Unauthorized"));

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some("Bearer not-a-jwt"),
            Some(chat_body("s1", None)),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_rejects_missing_fields() {
    let app = test_app().await;
    let bearer = bearer_for(Uuid::new_v4());

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(json!({ "sessionId": "s1", "context": "ctx" })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&response.body),
        Some("Missing required field: employeeName")
    );

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(json!({ "employeeName": "Jamie", "context": "ctx" })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&response.body),
        Some("Missing required field: sessionId")
    );
}

#[tokio::test]
async fn chat_session_runs_from_greeting_to_feedback() {
    let app = test_app().await;
    let user_id = Uuid::new_v4();
    let bearer = bearer_for(user_id);

    let greeting = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s1", None)),
        ),
    )
    .await;
    assert_eq!(greeting.status, StatusCode::OK);
    let greeting_text = greeting.body["response"]
        .as_str()
        .expect("greeting should be a string");
    assert!(greeting_text.contains("Jamie"));

    let stored = app
        .store
        .get_conversation("s1")
        .await
        .expect("store should respond")
        .expect("conversation should be created");
    assert_eq!(stored.name, "Addressing Performance Issues");
    assert_eq!(stored.scenario_id, Some(JAMIE_SCENARIO_ID));

    for (prompt, reply) in [
        (
            "Jamie, the last three deadlines slipped and the release was delayed.",
            "I know, I've been overloaded.",
        ),
        (
            "I appreciate your code quality, but the impact on the team is real.",
            "That's fair.",
        ),
        (
            "Let's agree on weekly check-ins as our next step.",
            "Okay, that would help.",
        ),
    ] {
        app.gateway.push_reply(reply).await;
        let response = send_json(
            &app.router,
            request(
                Method::POST,
                "/api/chat",
                Some(bearer.as_str()),
                Some(chat_body("s1", Some(prompt))),
            ),
        )
        .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({ "response": reply }));
    }

    app.gateway.push_reply(EVALUATOR_REPLY).await;
    let ended = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s1", Some("End conversation"))),
        ),
    )
    .await;
    assert_eq!(ended.status, StatusCode::OK);
    let feedback = &ended.body["feedback"];
    assert_eq!(feedback["sbi_usage"]["score"], 70);
    assert_eq!(feedback["action_plan"]["score"], 55);
    assert_eq!(feedback["balance"]["score"], 85);
    assert_eq!(
        feedback["overall"].as_array().map(Vec::len),
        Some(2)
    );

    let requests = app.gateway.requests().await;
    assert_eq!(requests.len(), 4);
    assert!(
        requests[..3]
            .iter()
            .all(|request| request.purpose == LlmPurpose::PersonaReply
                && request.messages[0].role == Role::System)
    );
    assert_eq!(requests[3].purpose, LlmPurpose::FeedbackEvaluation);

    let stored = app
        .store
        .get_conversation("s1")
        .await
        .expect("store should respond")
        .expect("conversation should exist");
    assert_eq!(stored.status, ConversationStatus::Ended);
    assert!(stored.feedback.is_some());

    let after_end = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s1", Some("One more thing"))),
        ),
    )
    .await;
    assert_eq!(after_end.status, StatusCode::CONFLICT);
    assert_eq!(app.gateway.requests().await.len(), 4);
}

#[tokio::test]
async fn early_end_returns_zero_feedback_without_calling_the_model() {
    let app = test_app().await;
    let bearer = bearer_for(Uuid::new_v4());

    send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s2", None)),
        ),
    )
    .await;

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s2", Some("end conversation"))),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    for key in ["sbi_usage", "action_plan", "balance"] {
        assert_eq!(response.body["feedback"][key]["score"], 0);
    }
    assert!(app.gateway.requests().await.is_empty());
}

#[tokio::test]
async fn llm_failure_maps_to_bad_gateway_and_keeps_history() {
    let app = test_app().await;
    let bearer = bearer_for(Uuid::new_v4());

    send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s3", None)),
        ),
    )
    .await;
    let before = app
        .store
        .get_conversation("s3")
        .await
        .expect("store should respond")
        .expect("conversation should exist");

    app.gateway.push_failure(LlmGatewayError::Timeout).await;
    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s3", Some("Can we talk about the deadline?"))),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        error_message(&response.body),
        Some("Unable to connect to OpenAI services")
    );

    let after = app
        .store
        .get_conversation("s3")
        .await
        .expect("store should respond")
        .expect("conversation should exist");
    assert_eq!(after.messages, before.messages);
    assert_eq!(after.version, before.version);
}

#[tokio::test]
async fn another_users_session_is_forbidden() {
    let app = test_app().await;
    let owner = bearer_for(Uuid::new_v4());
    let intruder = bearer_for(Uuid::new_v4());

    send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(owner.as_str()),
            Some(chat_body("s4", None)),
        ),
    )
    .await;

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(intruder.as_str()),
            Some(chat_body("s4", Some("hello"))),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(app.gateway.requests().await.is_empty());
}

#[tokio::test]
async fn store_outage_maps_to_internal_error() {
    let app = test_app().await;
    let bearer = bearer_for(Uuid::new_v4());
    app.store.set_available(false);

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/chat",
            Some(bearer.as_str()),
            Some(chat_body("s5", None)),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_message(&response.body), Some("Internal server error"));
}

#[tokio::test]
async fn coaching_prompt_returns_model_text() {
    let app = test_app().await;
    let bearer = bearer_for(Uuid::new_v4());
    app.gateway
        .push_reply("  Start with the situation, then the behavior.  ")
        .await;

    let response = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/prompts",
            Some(bearer.as_str()),
            Some(json!({ "prompt": "How do I open a tough conversation?" })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        json!({ "response": "Start with the situation, then the behavior." })
    );

    let requests = app.gateway.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].purpose, LlmPurpose::CoachingPrompt);
    assert_eq!(requests[0].messages[0].role, Role::System);

    let missing = send_json(
        &app.router,
        request(
            Method::POST,
            "/api/prompts",
            Some(bearer.as_str()),
            Some(json!({})),
        ),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&missing.body),
        Some("Missing required field: prompt")
    );
}
