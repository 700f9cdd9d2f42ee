use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::models::{User, UserRole};
use crate::db::UserRepository;
use crate::error::{AppError, AppResult};
use crate::routes::DataResponse;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub role: UserRole,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            role: u.role,
        }
    }
}

// ============================================================================
// JWT claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    iat: usize,
    exp: usize,
}

pub fn issue_token(config: &Config, user_id: i64) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.jwt.expiration_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
    )?;

    Ok(token)
}

async fn get_user_from_token(state: &Arc<AppState>, token: &str) -> AppResult<User> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt.secret.as_bytes()),
        &Validation::default(),
    )?;

    UserRepository::find_by_id(&state.db, data.claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)
}

// ============================================================================
// Handlers
// ============================================================================

/// Log in with username/password, returning a bearer token.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<DataResponse<LoginResponse>>> {
    let user = UserRepository::find_by_username(&state.db, &request.username)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !bcrypt::verify(&request.password, &user.password)? {
        tracing::debug!("Failed login attempt for {}", request.username);
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(&state.config, user.id)?;

    Ok(Json(DataResponse::new(LoginResponse { token })))
}

/// Current authenticated user.
async fn me(AuthUser(user): AuthUser) -> AppResult<Json<DataResponse<UserResponse>>> {
    Ok(Json(DataResponse::new(user.into())))
}

// ============================================================================
// Extractor
// ============================================================================

pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Extract Authorization header (Bearer token)
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("Missing or invalid Authorization header");
                AppError::Unauthorized
            })?;

        if !auth_header.to_ascii_lowercase().starts_with("bearer ") {
            tracing::debug!("Authorization header doesn't start with 'Bearer '");
            return Err(AppError::Unauthorized);
        }

        let token = auth_header[7..].trim();
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let user = get_user_from_token(state, token).await?;

        Ok(AuthUser(user))
    }
}
