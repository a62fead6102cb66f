//! `POST /api/v1/tasks/submit` (spec §4.4 "Submit", §6).

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::Multipart, Extension, Json};
use chrono::Utc;
use docforge_core::{DocForgeError, NewTask, Permission, Principal};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

const UPLOAD_CHUNK_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub task_id: String,
    pub status: &'static str,
    pub file_name: String,
    pub user_id: String,
    pub created_at: chrono::DateTime<Utc>,
}

pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, AppError> {
    if !principal.has_permission(Permission::TaskSubmit) {
        return Err(DocForgeError::Forbidden("missing TASK_SUBMIT permission".into()).into());
    }

    let mut staged_path: Option<PathBuf> = None;
    let mut original_name: Option<String> = None;
    let mut backend = "auto".to_string();
    let mut priority: i64 = 0;
    let mut options = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DocForgeError::InvalidInput(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let file_name = field
                .file_name()
                .map(|s| s.to_string())
                .ok_or_else(|| DocForgeError::InvalidInput("missing file name".into()))?;
            let staged_name = format!("{}_{file_name}", Uuid::new_v4());
            let path = state.uploads_root.join(&staged_name);

            stream_field_to_disk(field, &path).await?;

            original_name = Some(file_name);
            staged_path = Some(path);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| DocForgeError::InvalidInput(e.to_string()))?;

        match name.as_str() {
            "backend" => backend = value,
            "priority" => {
                priority = value
                    .parse()
                    .map_err(|_| DocForgeError::InvalidInput("priority must be an integer".into()))?;
            }
            "" => {}
            other => {
                // Every other field (lang, method, formula_enable,
                // table_enable, video/watermark/layout knobs, ...) is
                // collected into the opaque options map rather than
                // enumerated by name (spec.md §6 supplemented per
                // api_server.py's full submit field set).
                let parsed: Value = serde_json::from_str(&value).unwrap_or(Value::String(value));
                options.insert(other.to_string(), parsed);
            }
        }
    }

    let file_path = staged_path.ok_or_else(|| DocForgeError::InvalidInput("missing file field".into()))?;
    let file_name = original_name.unwrap_or_else(|| "upload.bin".to_string());

    let new_task = NewTask {
        file_name: file_name.clone(),
        file_path: file_path.to_string_lossy().to_string(),
        backend,
        options: Value::Object(options),
        priority,
        user_id: principal.user_id.clone(),
    };

    let task_id = state.store.create_task(new_task).await?;

    Ok(Json(SubmitResponse {
        success: true,
        task_id,
        status: "pending",
        file_name,
        user_id: principal.user_id,
        created_at: Utc::now(),
    }))
}

/// Copies a multipart field to disk in fixed-size chunks so memory use
/// is bounded regardless of upload size (spec §9 "Streaming upload
/// without unbounded memory").
async fn stream_field_to_disk(
    mut field: axum::extract::multipart::Field<'_>,
    path: &std::path::Path,
) -> Result<(), DocForgeError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DocForgeError::Storage(e.into()))?;

    let mut buffer = Vec::with_capacity(UPLOAD_CHUNK_BYTES);
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| DocForgeError::InvalidInput(e.to_string()))?
    {
        buffer.extend_from_slice(&chunk);
        if buffer.len() >= UPLOAD_CHUNK_BYTES {
            file.write_all(&buffer)
                .await
                .map_err(|e| DocForgeError::Storage(e.into()))?;
            buffer.clear();
        }
    }
    if !buffer.is_empty() {
        file.write_all(&buffer)
            .await
            .map_err(|e| DocForgeError::Storage(e.into()))?;
    }
    file.flush().await.map_err(|e| DocForgeError::Storage(e.into()))?;
    Ok(())
}
