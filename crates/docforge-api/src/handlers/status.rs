//! `GET /api/v1/tasks/{id}` (spec §4.4 "Get status/result").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as AxPath, Query};
use axum::{Extension, Json};
use docforge_core::{DocForgeError, Permission, Principal, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::markdown::{rewrite_image_references, RewriteConfig};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub upload_images: bool,
}

#[derive(Debug, Serialize, Default)]
pub struct TaskData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    pub markdown_file: Option<String>,
    pub json_available: bool,
    pub images_uploaded: bool,
    pub from_cache: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TaskData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn authorize_read(principal: &Principal, task: &Task) -> Result<(), AppError> {
    if task.user_id == principal.user_id || principal.has_permission(Permission::TaskViewAll) {
        Ok(())
    } else {
        Err(DocForgeError::Forbidden("not permitted to view this task".into()).into())
    }
}

/// Per-backend JSON discovery hint (spec §9 Open Question 4). Kept as a
/// small local table rather than importing `docforge-worker` — the API
/// and worker processes intentionally share nothing beyond the wire
/// contract (spec §9 "do not collapse [scheduler/worker] into shared
/// memory" applies equally here).
fn json_hint_for_backend(backend: &str) -> Option<&'static str> {
    match backend {
        "sensevoice" | "specialized-format" => Some("result.json"),
        _ => None,
    }
}

async fn find_json_file(result_dir: &Path, stem: &str, backend: &str) -> Option<PathBuf> {
    if let Some(hint) = json_hint_for_backend(backend) {
        let candidate = result_dir.join(hint);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    for candidate in [
        result_dir.join(format!("{stem}_content_list.json")),
        result_dir.join("content.json"),
        result_dir.join("result.json"),
    ] {
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

pub async fn get_status(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    AxPath(task_id): AxPath<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, AppError> {
    let task = state
        .store
        .get_task(&task_id)
        .await?
        .ok_or_else(|| DocForgeError::NotFound(format!("task {task_id} not found")))?;

    authorize_read(&principal, &task)?;

    if task.status != TaskStatus::Completed {
        return Ok(Json(StatusResponse {
            success: true,
            task_id: task.id,
            status: task.status,
            error_message: task.error_message,
            data: None,
            message: None,
        }));
    }

    let Some(result_path) = task.result_path.as_deref() else {
        return Ok(Json(StatusResponse {
            success: true,
            task_id: task.id,
            status: task.status,
            error_message: None,
            data: None,
            message: Some("result artifacts are no longer available".into()),
        }));
    };

    let result_dir = PathBuf::from(result_path);
    if !result_dir.exists() {
        return Ok(Json(StatusResponse {
            success: true,
            task_id: task.id,
            status: TaskStatus::Completed,
            error_message: None,
            data: None,
            message: Some("result artifacts are no longer available".into()),
        }));
    }

    let format = query.format.as_deref().unwrap_or("both");
    let mut data = TaskData::default();

    if format == "markdown" || format == "both" {
        let markdown_file = result_dir.join("result.md");
        let relative_result_path = result_dir
            .strip_prefix(&state.output_root)
            .unwrap_or(&result_dir)
            .to_string_lossy()
            .replace('\\', "/");

        let cache_path = result_dir.join("result_minio.md");
        if query.upload_images && cache_path.exists() {
            let cached = tokio::fs::read_to_string(&cache_path)
                .await
                .map_err(|e| DocForgeError::Storage(e.into()))?;
            data.markdown = Some(cached);
            data.images_uploaded = true;
            data.from_cache = true;
        } else if markdown_file.exists() {
            let raw = tokio::fs::read_to_string(&markdown_file)
                .await
                .map_err(|e| DocForgeError::Storage(e.into()))?;

            let image_dir = result_dir.join("images");
            let cfg = RewriteConfig {
                image_dir: &image_dir,
                output_root_relative_result_path: &relative_result_path,
                upload_images: query.upload_images,
                object_store: if query.upload_images {
                    Some(state.object_store.as_ref())
                } else {
                    None
                },
                bucket: &state.bucket,
                secure: state.secure,
            };
            let (rewritten, uploaded) = rewrite_image_references(&raw, &cfg).await;

            if uploaded {
                tokio::fs::write(&cache_path, &rewritten)
                    .await
                    .map_err(|e| DocForgeError::Storage(e.into()))?;
            }
            data.images_uploaded = uploaded;
            data.markdown = Some(rewritten);
        }
        data.markdown_file = Some(markdown_file.to_string_lossy().to_string());
    }

    if format == "json" || format == "both" {
        let stem = Path::new(&task.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("result");
        if let Some(json_path) = find_json_file(&result_dir, stem, &task.backend).await {
            data.json_available = true;
            if let Ok(raw) = tokio::fs::read_to_string(&json_path).await {
                data.json = serde_json::from_str(&raw).ok();
            }
        }
    }

    Ok(Json(StatusResponse {
        success: true,
        task_id: task.id,
        status: TaskStatus::Completed,
        error_message: None,
        data: Some(data),
        message: None,
    }))
}
