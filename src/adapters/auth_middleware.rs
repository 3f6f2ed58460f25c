use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::adapters::api_handler::ApiResponse;
use crate::domain::auth::{AuthConfig, AuthContext};

/// JWT claims; `sub` is the owner id
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub type SharedAuthMiddleware = Arc<AuthMiddleware>;

pub struct AuthMiddleware {
    config: Arc<AuthConfig>,
}

impl AuthMiddleware {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self { config }
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        if !self.config.enabled {
            return Ok(AuthContext::default());
        }
        self.validate_bearer_token(headers)
    }

    fn validate_bearer_token(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let auth_header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingCredentials)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidCredentials)?;

        let secret = self
            .config
            .jwt_secret
            .as_deref()
            .ok_or(AuthError::ConfigurationError)?;

        let algorithm = match self.config.jwt_algorithm.as_str() {
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            _ => Algorithm::HS256,
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("Rejected bearer token: {}", e);
            AuthError::InvalidCredentials
        })?;

        Ok(AuthContext::user(token_data.claims.sub))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Auth configuration error")]
    ConfigurationError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingCredentials | AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid token")
            }
            AuthError::ConfigurationError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Auth configuration error")
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

pub async fn auth_middleware(
    State(auth): State<SharedAuthMiddleware>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_context = auth.authenticate(request.headers())?;

    request.extensions_mut().insert(auth_context);

    Ok(next.run(request).await)
}
