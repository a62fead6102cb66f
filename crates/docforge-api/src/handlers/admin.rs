//! `POST /api/v1/admin/cleanup`, `POST /api/v1/admin/reset-stale` (spec
//! §4.4 "Admin").

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use docforge_core::{DocForgeError, Permission, Principal};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

fn require_queue_manage(principal: &Principal) -> Result<(), AppError> {
    if principal.has_permission(Permission::QueueManage) {
        Ok(())
    } else {
        Err(DocForgeError::Forbidden("missing QUEUE_MANAGE permission".into()).into())
    }
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    docforge_core::DEFAULT_RETENTION_DAYS
}

#[derive(Debug, Serialize)]
pub struct DeletedCount {
    pub success: bool,
    pub deleted_count: u64,
}

pub async fn cleanup(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<DeletedCount>, AppError> {
    require_queue_manage(&principal)?;
    let deleted_count = state.store.cleanup_old_task_records(query.days).await?;
    Ok(Json(DeletedCount {
        success: true,
        deleted_count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetStaleQuery {
    #[serde(default = "default_timeout")]
    pub timeout_minutes: i64,
}

fn default_timeout() -> i64 {
    30
}

#[derive(Debug, Serialize)]
pub struct ResetCount {
    pub success: bool,
    pub reset_count: u64,
}

pub async fn reset_stale(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ResetStaleQuery>,
) -> Result<Json<ResetCount>, AppError> {
    require_queue_manage(&principal)?;
    let reset_count = state.store.reset_stale_tasks(query.timeout_minutes).await?;
    Ok(Json(ResetCount {
        success: true,
        reset_count,
    }))
}
