//! REST API handlers for agents and chat
//!
//! Every handler runs behind the auth middleware and scopes its work to the
//! caller's owner id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::StreamExt;

use crate::domain::auth::AuthContext;
use crate::persistence::{AgentDraft, AgentRecord, AgentUpdate};
use crate::service::{ChatService, SendMessage, ServiceError};

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ChatService>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

/// Agent as exposed over the API; the stored key is reduced to a flag
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentDto {
    pub id: i64,
    pub name: String,
    pub role: Option<String>,
    pub goal: Option<String>,
    pub model_name: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub top_p: Option<f64>,
    pub top_k: Option<i64>,
    pub provider: String,
    pub has_api_key: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AgentRecord> for AgentDto {
    fn from(record: AgentRecord) -> Self {
        let has_api_key = record.has_api_key();
        Self {
            id: record.id,
            name: record.name,
            role: record.role,
            goal: record.goal,
            model_name: record.model_name,
            temperature: record.temperature,
            max_tokens: record.max_tokens,
            top_p: record.top_p,
            top_k: record.top_k,
            provider: record.provider,
            has_api_key,
            created_at: record.created_at,
        }
    }
}

fn error_response(err: ServiceError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), "Request failed: {}", err);
    }
    (status, Json(ApiResponse::<()>::error(err.to_string()))).into_response()
}

// ============================================================================
// Agent Endpoints
// ============================================================================

/// POST /agents/create - Create an agent owned by the caller
pub async fn create_agent(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Json(draft): Json<AgentDraft>,
) -> Response {
    match state.service.create_agent(auth.owner_id(), draft).await {
        Ok(agent) => (StatusCode::CREATED, Json(ApiResponse::success(AgentDto::from(agent)))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /agents/list - List the caller's agents
pub async fn list_agents(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
) -> Response {
    match state.service.list_agents(auth.owner_id()).await {
        Ok(agents) => {
            let agents: Vec<AgentDto> = agents.into_iter().map(AgentDto::from).collect();
            (StatusCode::OK, Json(ApiResponse::success(agents))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /agents/:id - Get a single agent
pub async fn get_agent(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(agent_id): Path<i64>,
) -> Response {
    match state.service.get_agent(auth.owner_id(), agent_id).await {
        Ok(agent) => (StatusCode::OK, Json(ApiResponse::success(AgentDto::from(agent)))).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /agents/:id - Update an agent
pub async fn update_agent(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(agent_id): Path<i64>,
    Json(update): Json<AgentUpdate>,
) -> Response {
    match state.service.update_agent(auth.owner_id(), agent_id, update).await {
        Ok(agent) => (StatusCode::OK, Json(ApiResponse::success(AgentDto::from(agent)))).into_response(),
        Err(e) => error_response(e),
    }
}

/// DELETE /agents/:id - Delete an agent and its history
pub async fn delete_agent(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(agent_id): Path<i64>,
) -> Response {
    match state.service.delete_agent(auth.owner_id(), agent_id).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::<()>::ok())).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Chat Endpoints
// ============================================================================

/// POST /chat/:agent_id/send - Blocking chat turn
pub async fn send_message(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(agent_id): Path<i64>,
    Json(request): Json<SendMessage>,
) -> Response {
    match state.service.send(auth.owner_id(), agent_id, request).await {
        Ok(reply) => (StatusCode::OK, Json(ApiResponse::success(reply))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /chat/:agent_id/send-stream - Chat turn as server-sent events.
///
/// Each `data:` frame holds one JSON stream event.
pub async fn send_message_stream(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(agent_id): Path<i64>,
    Json(request): Json<SendMessage>,
) -> Response {
    match state.service.send_stream(auth.owner_id(), agent_id, request).await {
        Ok(events) => {
            let frames = events.map(|event| Event::default().json_data(event));
            Sse::new(frames)
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /chat/:agent_id/history - Messages in creation order
pub async fn get_history(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(agent_id): Path<i64>,
) -> Response {
    match state.service.history(auth.owner_id(), agent_id).await {
        Ok(messages) => (StatusCode::OK, Json(ApiResponse::success(messages))).into_response(),
        Err(e) => error_response(e),
    }
}
