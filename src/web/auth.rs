use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::models::User;
use crate::state::AppState;
use crate::web::error::{ApiError, ApiResult};

/// Authenticated dashboard user, resolved from a bearer session token.
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let user = state
            .db
            .find_session_user(token)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        Ok(AuthUser(user))
    }
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let username = req.username.trim();
    let email = req.email.trim();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation(
            "username, email and password are required".to_string(),
        ));
    }

    if state.db.find_user_by_email(email).await?.is_some() {
        return Err(ApiError::Conflict("email address already exists".to_string()));
    }
    if state.db.find_user_by_username(username).await?.is_some() {
        return Err(ApiError::Conflict("username already exists".to_string()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state.db.create_user(username, email, &password_hash).await?;
    tracing::info!("created dashboard account {}", user.username);

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = state
        .db
        .find_user_by_email(req.email.trim())
        .await?
        .filter(|u| verify_password(&req.password, &u.password_hash))
        .ok_or(ApiError::Unauthorized)?;

    let token = state.db.create_session(user.id).await?;

    Ok(Json(serde_json::json!({ "token": token, "user": user })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    headers: axum::http::HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.db.delete_session(token).await?;
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("username is required".to_string()));
    }

    if let Some(existing) = state.db.find_user_by_username(username).await? {
        if existing.id != user.id {
            return Err(ApiError::Conflict("username already exists".to_string()));
        }
    }

    state.db.update_username(user.id, username).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::Validation(
            "current password is incorrect".to_string(),
        ));
    }
    if req.new_password.is_empty() {
        return Err(ApiError::Validation("new password is required".to_string()));
    }

    let password_hash = hash_password(&req.new_password)?;
    state.db.update_password(user.id, &password_hash).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip_verifies() {
        let hash = hash_password("s3cret").unwrap();
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("s3cret", "not-a-phc-string"));
    }
}
