pub mod extractor;

use std::path::Path;

use uuid::Uuid;

use crate::db::{models::TrainingFile, Database};

/// Upload whitelist. Only `.txt` files are parsed for Q&A pairs; the other
/// formats are accepted and stored but complete without extraction.
pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "pdf", "doc", "docx", "csv"];

pub fn file_extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

pub fn allowed_file(filename: &str) -> bool {
    file_extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Run the extractor over an uploaded file and persist one knowledge entry
/// per pair. The file ends up `completed` (even with zero pairs) or `failed`
/// on a read/persistence error; failed imports are not retried.
pub async fn process_training_file(
    db: &Database,
    upload_dir: &str,
    file_id: Uuid,
) -> anyhow::Result<bool> {
    let Some(file) = db.get_training_file(file_id).await? else {
        return Ok(false);
    };

    if !file.filename.ends_with(".txt") {
        db.mark_file_completed(file_id).await?;
        return Ok(true);
    }

    match import_entries(db, upload_dir, &file).await {
        Ok(count) => {
            tracing::info!("imported {} pairs from {}", count, file.original_filename);
            db.mark_file_completed(file_id).await?;
            Ok(true)
        }
        Err(e) => {
            tracing::error!("error processing training file {}: {e}", file.original_filename);
            db.mark_file_failed(file_id).await?;
            Ok(false)
        }
    }
}

async fn import_entries(
    db: &Database,
    upload_dir: &str,
    file: &TrainingFile,
) -> anyhow::Result<usize> {
    let path = Path::new(upload_dir).join(&file.filename);
    let content = tokio::fs::read_to_string(&path).await?;

    let pairs = extractor::extract(&content);
    for pair in &pairs {
        db.add_training_entry(
            file.user_id,
            &pair.question,
            &pair.answer,
            "file",
            Some(&file.original_filename),
        )
        .await?;
    }
    Ok(pairs.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_whitelist() {
        assert!(allowed_file("data.txt"));
        assert!(allowed_file("report.PDF"));
        assert!(allowed_file("archive.tar.csv"));
        assert!(!allowed_file("script.sh"));
        assert!(!allowed_file("noextension"));
    }
}
