use std::path::Path as FsPath;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{TrainingEntry, TrainingFile};
use crate::state::AppState;
use crate::training;
use crate::web::auth::AuthUser;
use crate::web::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct ManualEntryRequest {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub question: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub success: bool,
}

pub async fn add_manual_entry(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ManualEntryRequest>,
) -> ApiResult<(StatusCode, Json<TrainingEntry>)> {
    let question = req.question.trim();
    let answer = req.answer.trim();
    if question.is_empty() || answer.is_empty() {
        return Err(ApiError::Validation(
            "question and answer cannot be empty".to_string(),
        ));
    }

    let entry = state
        .db
        .add_training_entry(user.id, question, answer, "manual", None)
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<TrainingEntry>>> {
    Ok(Json(state.db.list_training_data(user.id).await?))
}

pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEntryRequest>,
) -> ApiResult<Json<TrainingEntry>> {
    let entry = state
        .db
        .get_training_entry(id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let (question, answer) = merged_fields(req.question, req.answer, &entry)?;

    let updated = state.db.update_training_entry(id, &question, &answer).await?;
    Ok(Json(updated))
}

/// Fold a partial update over the stored fields. Knowledge entries must
/// stay non-empty after trimming, same as on creation.
fn merged_fields(
    question: Option<String>,
    answer: Option<String>,
    entry: &TrainingEntry,
) -> ApiResult<(String, String)> {
    let question = question
        .unwrap_or_else(|| entry.question.clone())
        .trim()
        .to_string();
    let answer = answer
        .unwrap_or_else(|| entry.answer.clone())
        .trim()
        .to_string();

    if question.is_empty() || answer.is_empty() {
        return Err(ApiError::Validation(
            "question and answer cannot be empty".to_string(),
        ));
    }
    Ok((question, answer))
}

pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .db
        .get_training_entry(id, user.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    state.db.delete_training_entry(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<TrainingFile>>> {
    Ok(Json(state.db.list_training_files(user.id).await?))
}

/// Accept an uploaded training file, store it under the upload directory
/// and run the extractor synchronously. The response carries the terminal
/// status (`completed` or `failed`).
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_filename = field.file_name().unwrap_or_default().to_string();
        if original_filename.is_empty() {
            return Err(ApiError::Validation("no selected file".to_string()));
        }
        if !training::allowed_file(&original_filename) {
            return Err(ApiError::Validation("file type not allowed".to_string()));
        }

        let file_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read upload: {e}")))?;

        let ext = training::file_extension(&original_filename)
            .unwrap_or_default()
            .to_lowercase();
        let stored_name = format!("{}.{ext}", Uuid::new_v4().simple());

        tokio::fs::create_dir_all(&state.config.upload_dir)
            .await
            .map_err(anyhow::Error::from)?;
        let path = FsPath::new(&state.config.upload_dir).join(&stored_name);
        tokio::fs::write(&path, &data)
            .await
            .map_err(anyhow::Error::from)?;

        let file = state
            .db
            .create_training_file(
                user.id,
                &stored_name,
                &original_filename,
                data.len() as i64,
                &file_type,
            )
            .await?;

        let success =
            training::process_training_file(&state.db, &state.config.upload_dir, file.id).await?;

        let file = state
            .db
            .get_training_file(file.id)
            .await?
            .ok_or(ApiError::NotFound)?;

        return Ok(Json(UploadResponse {
            id: file.id,
            filename: file.original_filename,
            status: file.status,
            created_at: file.created_at,
            success,
        }));
    }

    Err(ApiError::Validation("no file part".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry() -> TrainingEntry {
        TrainingEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            question: "ما هو اسم المؤسسة؟".to_string(),
            answer: "مؤسسة الحبيب".to_string(),
            source_type: "manual".to_string(),
            source_name: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn update_keeps_omitted_fields() {
        let (question, answer) =
            merged_fields(None, Some("جواب جديد".to_string()), &entry()).unwrap();
        assert_eq!(question, "ما هو اسم المؤسسة؟");
        assert_eq!(answer, "جواب جديد");
    }

    #[test]
    fn update_trims_provided_fields() {
        let (question, answer) =
            merged_fields(Some("  سؤال  ".to_string()), None, &entry()).unwrap();
        assert_eq!(question, "سؤال");
        assert_eq!(answer, "مؤسسة الحبيب");
    }

    #[test]
    fn update_rejects_empty_question() {
        let err = merged_fields(Some("".to_string()), None, &entry()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn update_rejects_whitespace_only_answer() {
        let err = merged_fields(None, Some("   \n".to_string()), &entry()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
