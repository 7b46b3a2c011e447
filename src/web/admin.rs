use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{TelegramMessage, TelegramUser};
use crate::state::AppState;
use crate::web::auth::AuthUser;
use crate::web::error::{ApiError, ApiResult};

const DEFAULT_APP_NAME: &str = "Al-Habib Medical Assistant";
const DEFAULT_WELCOME_MSG: &str = "How can I help you today?";

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub telegram_users: i64,
    pub telegram_messages: i64,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub app_name: String,
    pub welcome_msg: String,
    pub admin_telegram_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub app_name: Option<String>,
    pub welcome_msg: Option<String>,
    pub admin_telegram_id: Option<String>,
}

pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(DashboardStats {
        telegram_users: state.db.count_telegram_users().await?,
        telegram_messages: state.db.count_telegram_messages().await?,
    }))
}

pub async fn list_telegram_users(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> ApiResult<Json<Vec<TelegramUser>>> {
    Ok(Json(state.db.list_telegram_users().await?))
}

pub async fn telegram_user_messages(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<TelegramMessage>>> {
    // 404 for unknown users rather than an empty list
    state
        .db
        .get_telegram_user(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(state.db.telegram_user_messages(id).await?))
}

/// Settings are resolved at read time with static defaults, never cached.
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> ApiResult<Json<SettingsResponse>> {
    Ok(Json(SettingsResponse {
        app_name: state
            .db
            .get_setting("app_name")
            .await?
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        welcome_msg: state
            .db
            .get_setting("welcome_msg")
            .await?
            .unwrap_or_else(|| DEFAULT_WELCOME_MSG.to_string()),
        admin_telegram_id: state
            .db
            .get_setting("admin_telegram_id")
            .await?
            .unwrap_or_default(),
    }))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(req): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(app_name) = req.app_name {
        state
            .db
            .set_setting("app_name", &app_name, Some("Application Name"))
            .await?;
    }
    if let Some(welcome_msg) = req.welcome_msg {
        state
            .db
            .set_setting("welcome_msg", &welcome_msg, Some("Welcome Message"))
            .await?;
    }
    if let Some(admin_id) = req.admin_telegram_id {
        state
            .db
            .set_setting(
                "admin_telegram_id",
                &admin_id,
                Some("Admin Telegram ID for notifications"),
            )
            .await?;
    }
    Ok(Json(serde_json::json!({ "success": true })))
}
