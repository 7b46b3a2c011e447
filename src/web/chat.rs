use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::context::ChatTurn;
use crate::db::models::{Conversation, ConversationSummary, Message};
use crate::db::Database;
use crate::state::AppState;
use crate::web::auth::AuthUser;
use crate::web::error::{ApiError, ApiResult};

/// Title given to conversations at creation, replaced by a preview of the
/// first user message.
const DEFAULT_TITLE: &str = "New Conversation";
const TITLE_PREVIEW_CHARS: usize = 40;

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub user_message: Message,
    pub assistant_message: Message,
}

pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.db.list_conversations(user.id).await?))
}

pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Conversation>> {
    Ok(Json(state.db.create_conversation(user.id).await?))
}

pub async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }

    state
        .db
        .get_conversation(id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    state.db.rename_conversation(id, title).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .db
        .get_conversation(id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    state.db.delete_conversation(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    let conversation = state
        .db
        .get_conversation(id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(state.db.get_messages(conversation.id).await?))
}

/// Append a user turn, generate the assistant turn and persist both within
/// one transaction. Any persistence failure rolls the whole exchange back,
/// including the user turn.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<Json<SendMessageResponse>> {
    let conversation = state
        .db
        .get_conversation(id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if req.message.trim().is_empty() {
        return Err(ApiError::Validation("message is required".to_string()));
    }

    // Prior turns only; the new message is appended by the assembler.
    let history: Vec<ChatTurn> = state
        .db
        .get_messages(conversation.id)
        .await?
        .into_iter()
        .map(|m| ChatTurn {
            role: m.role,
            content: m.content,
        })
        .collect();

    // Generate the reply before opening the transaction: the gateway call
    // can block for up to two 60-second attempts, and an open transaction
    // pins one of the few pool connections for the whole wait.
    let reply = state.engine.reply(&state.db, &req.message, &history).await;

    let mut tx = state.db.begin().await?;

    let user_message =
        Database::save_message_tx(&mut tx, conversation.id, "user", &req.message).await?;

    if conversation.title == DEFAULT_TITLE {
        let title = derive_title(&req.message);
        Database::set_conversation_title_tx(&mut tx, conversation.id, &title).await?;
    }

    let assistant_message =
        Database::save_message_tx(&mut tx, conversation.id, "assistant", &reply).await?;
    Database::touch_conversation_tx(&mut tx, conversation.id).await?;

    tx.commit().await.map_err(anyhow::Error::from)?;

    Ok(Json(SendMessageResponse {
        user_message,
        assistant_message,
    }))
}

/// First 40 characters of the message, with an ellipsis when truncated.
fn derive_title(message: &str) -> String {
    let preview: String = message.chars().take(TITLE_PREVIEW_CHARS).collect();
    let preview = preview.trim();
    if message.chars().count() > TITLE_PREVIEW_CHARS {
        format!("{preview}...")
    } else if preview.is_empty() {
        "Conversation".to_string()
    } else {
        preview.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_becomes_title_verbatim() {
        assert_eq!(derive_title("ما هي خدماتكم؟"), "ما هي خدماتكم؟");
    }

    #[test]
    fn long_message_is_truncated_with_ellipsis() {
        let message = "a".repeat(60);
        let title = derive_title(&message);
        assert_eq!(title, format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let message = "س".repeat(45);
        let title = derive_title(&message);
        assert_eq!(title.chars().count(), 43); // 40 + "..."
    }

    #[test]
    fn whitespace_message_gets_fallback_title() {
        assert_eq!(derive_title("   "), "Conversation");
    }
}
