//! # Agentdesk - multi-tenant LLM agent backend
//!
//! Users define agents (provider, model, sampling settings, optional API key)
//! and chat with them through one provider-neutral adapter that speaks to
//! OpenAI, Fireworks, and Google Gemini.
//!
//! ## Architecture
//!
//! - **agents**: provider adapter, continuation policy, stream events
//! - **persistence**: agents and chat history behind `ChatRepository`
//! - **service**: `ChatService` tying records, credentials, and adapters together
//! - **adapters**: axum handlers, JWT middleware, health checks
//! - **config**: settings loading and validation

pub mod adapters;
pub mod agents;
pub mod cli;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod service;

use crate::adapters::api_handler::{self, ApiState};
use crate::adapters::auth_middleware::{auth_middleware, AuthMiddleware, SharedAuthMiddleware};
use crate::adapters::health_handler::HealthHandler;
use crate::config::Settings;
use crate::persistence::ChatRepository;
use crate::service::ChatService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the chat service described by `settings` on top of `repository`
pub fn create_service(settings: &Settings, repository: Arc<dyn ChatRepository>) -> Arc<ChatService> {
    Arc::new(ChatService::new(
        repository,
        settings.providers.client(),
        settings.chat.pacing(),
        settings.chat.offline_echo,
    ))
}

/// Creates the Axum application router with all endpoints configured.
///
/// Health routes are public; agent and chat routes require a bearer token
/// when `auth.enabled` is set.
pub fn create_app(settings: &Settings, service: Arc<ChatService>) -> Router {
    let health_handler = Arc::new(HealthHandler::new());

    // Public routes (no authentication required)
    let public_router = Router::new()
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }));

    let api_state = ApiState { service };

    let protected_router = Router::new()
        .route("/agents/create", post(api_handler::create_agent))
        .route("/agents/list", get(api_handler::list_agents))
        .route(
            "/agents/:id",
            get(api_handler::get_agent)
                .put(api_handler::update_agent)
                .delete(api_handler::delete_agent),
        )
        .route("/chat/:agent_id/send", post(api_handler::send_message))
        .route("/chat/:agent_id/send-stream", post(api_handler::send_message_stream))
        .route("/chat/:agent_id/history", get(api_handler::get_history))
        .with_state(api_state);

    // The middleware also runs with auth disabled so handlers always see an AuthContext
    let auth: SharedAuthMiddleware = Arc::new(AuthMiddleware::new(Arc::new(settings.auth.clone())));
    let protected_router =
        protected_router.layer(axum::middleware::from_fn_with_state(auth, auth_middleware));

    let router = public_router
        .merge(protected_router)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    if settings.server.cors_permissive {
        router.layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
    } else {
        router
    }
}
