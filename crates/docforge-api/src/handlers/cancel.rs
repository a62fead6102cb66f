//! `DELETE /api/v1/tasks/{id}` (spec §4.4 "Cancel").

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use docforge_core::{DocForgeError, Permission, Principal};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub task_id: String,
}

pub async fn cancel(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    let task = state
        .store
        .get_task(&task_id)
        .await?
        .ok_or_else(|| DocForgeError::NotFound(format!("task {task_id} not found")))?;

    let is_owner = task.user_id == principal.user_id;
    let is_admin = principal.has_permission(Permission::TaskDeleteAll);
    if !is_owner && !is_admin {
        return Err(DocForgeError::Forbidden("not permitted to cancel this task".into()).into());
    }

    state.store.cancel(&task_id).await?;

    let upload_path = std::path::Path::new(&task.file_path);
    if let Err(e) = tokio::fs::remove_file(upload_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(task_id, error = %e, "failed to remove staged upload on cancel");
        }
    }

    Ok(Json(CancelResponse {
        success: true,
        task_id,
    }))
}
