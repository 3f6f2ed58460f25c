use agentdesk::config::Settings;
use agentdesk::persistence::InMemoryRepository;
use agentdesk::{create_app, create_service};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "integration-secret";

fn settings(offline_echo: bool) -> Settings {
    let mut settings = Settings::default();
    settings.auth.jwt_secret = Some(SECRET.to_string());
    settings.chat.offline_echo = offline_echo;
    settings.chat.stream_chunk_delay_ms = 1;
    settings.chat.echo_delay_ms = 1;
    settings
}

fn app(settings: &Settings) -> Router {
    let service = create_service(settings, Arc::new(InMemoryRepository::new()));
    create_app(settings, service)
}

fn token(sub: &str) -> String {
    let claims = json!({
        "sub": sub,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn create_agent(app: &Router, user: &str, body: Value) -> i64 {
    let (status, body) = call(app, request("POST", "/agents/create", Some(user), Some(body))).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["id"].as_i64().unwrap()
}

/// Parse every `data:` frame of an event-stream body
async fn stream_events(app: &Router, req: Request<Body>) -> (StatusCode, Vec<Value>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body_bytes.to_vec()).unwrap();
    let events = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect();
    (status, events)
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app(&settings(false));

    let (status, body) = call(&app, request("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = call(&app, request("GET", "/health/live", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let app = app(&settings(false));

    let (status, body) = call(&app, request("GET", "/agents/list", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"success": false, "error": "Invalid token"}));

    let req = Request::builder()
        .uri("/agents/list")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn test_agent_crud_is_scoped_to_owner() {
    let app = app(&settings(false));

    let id = create_agent(&app, "alice", json!({"name": "Ada", "api_key": "sk-stored"})).await;

    let (status, body) = call(&app, request("GET", &format!("/agents/{}", id), Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let agent = &body["data"];
    assert_eq!(agent["name"], "Ada");
    assert_eq!(agent["model_name"], "gpt-4-turbo");
    assert_eq!(agent["temperature"], 0.7);
    assert_eq!(agent["max_tokens"], 1024);
    assert_eq!(agent["top_p"], 1.0);
    assert_eq!(agent["top_k"], 50);
    assert_eq!(agent["provider"], "openai");
    assert_eq!(agent["has_api_key"], true);
    assert!(agent.get("api_key").is_none());

    let (status, body) = call(
        &app,
        request(
            "PUT",
            &format!("/agents/{}", id),
            Some("alice"),
            Some(json!({"provider": "gemini", "model_name": "gemini-1.5-flash", "api_key": ""})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["provider"], "gemini");
    assert_eq!(body["data"]["has_api_key"], false);

    let (status, body) = call(&app, request("GET", "/agents/list", Some("bob"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = call(&app, request("GET", &format!("/agents/{}", id), Some("bob"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Agent not found");

    let (status, _) = call(&app, request("DELETE", &format!("/agents/{}", id), Some("bob"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, request("DELETE", &format!("/agents/{}", id), Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, request("GET", &format!("/agents/{}", id), Some("alice"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_requires_api_key() {
    let app = app(&settings(false));
    let id = create_agent(&app, "alice", json!({"name": "Ada"})).await;

    let (status, body) = call(
        &app,
        request("POST", &format!("/chat/{}/send", id), Some("alice"), Some(json!({"message": "hi"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("No API key configured"));

    let (status, _) = call(
        &app,
        request("POST", &format!("/chat/{}/send-stream", id), Some("alice"), Some(json!({"message": "hi"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_offline_echo_chat_and_history() {
    let app = app(&settings(true));
    let id = create_agent(&app, "alice", json!({"name": "Ada", "temperature": 0.2})).await;

    let (status, body) = call(
        &app,
        request("POST", &format!("/chat/{}/send", id), Some("alice"), Some(json!({"message": "hello"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let reply = &body["data"];
    assert_eq!(reply["response"], "[Ada - gpt-4-turbo | temp=0.2] Echo: hello");

    let (status, body) = call(&app, request("GET", &format!("/chat/{}/history", id), Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["sender"], "user");
    assert_eq!(history[0]["id"], reply["user_message_id"]);
    assert_eq!(history[1]["sender"], "agent");
    assert_eq!(history[1]["id"], reply["bot_message_id"]);

    let (status, _) = call(&app, request("GET", &format!("/chat/{}/history", id), Some("bob"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_chat_through_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Hi there!"}, "finish_reason": "stop"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/fireworks/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
        .mount(&server)
        .await;

    let mut settings = settings(false);
    settings.providers.openai_base_url = server.uri();
    settings.providers.fireworks_base_url = format!("{}/fireworks", server.uri());
    let app = app(&settings);

    let id = create_agent(&app, "alice", json!({"name": "Ada", "api_key": "sk-live"})).await;
    let (status, body) = call(
        &app,
        request("POST", &format!("/chat/{}/send", id), Some("alice"), Some(json!({"message": "hello"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["response"], "Hi there!");

    let id = create_agent(&app, "alice", json!({"name": "Fw", "provider": "fireworks"})).await;
    let (status, body) = call(
        &app,
        request(
            "POST",
            &format!("/chat/{}/send", id),
            Some("alice"),
            Some(json!({"message": "hello", "api_key": "fw-wrong"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("bad key"));
}

#[tokio::test]
async fn test_send_stream_emits_events_and_persists_reply() {
    let app = app(&settings(true));
    let id = create_agent(&app, "alice", json!({"name": "Ada"})).await;

    let (status, events) = stream_events(
        &app,
        request(
            "POST",
            &format!("/chat/{}/send-stream", id),
            Some("alice"),
            Some(json!({"message": "a fairly long prompt to stream back"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, request("GET", &format!("/chat/{}/history", id), Some("alice"), None)).await;
    let history = body["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);

    assert_eq!(events.first().unwrap()["type"], "start");
    assert_eq!(events[0]["correlationId"], history[0]["id"].to_string());

    let done = events.last().unwrap();
    assert_eq!(done["type"], "done");
    assert_eq!(done["correlationId"], history[1]["id"].to_string());
    assert_eq!(done["fullText"], history[1]["message"]);

    let streamed: String = events
        .iter()
        .filter(|e| e["type"] == "chunk")
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert_eq!(streamed, done["fullText"].as_str().unwrap());
}

#[tokio::test]
async fn test_send_stream_failure_persists_only_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "rate limited"}})))
        .mount(&server)
        .await;

    let mut settings = settings(false);
    settings.providers.openai_base_url = server.uri();
    let app = app(&settings);
    let id = create_agent(&app, "alice", json!({"name": "Ada", "api_key": "sk"})).await;

    let (status, events) = stream_events(
        &app,
        request("POST", &format!("/chat/{}/send-stream", id), Some("alice"), Some(json!({"message": "hi"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1], json!({"type": "error", "message": "rate limited"}));

    let (_, body) = call(&app, request("GET", &format!("/chat/{}/history", id), Some("alice"), None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
