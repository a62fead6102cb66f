//! `GET /api/v1/queue/stats`, `GET /api/v1/queue/tasks` (spec §4.4 "List").

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use docforge_core::{DocForgeError, Permission, Principal, QueueStats, Task};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Per-status counts plus the derived `total` (spec §4.1 "get_queue_stats"
/// — "a mapping plus a `total`"). `QueueStats` itself stays a plain
/// per-status record; `total` is computed at the response boundary
/// rather than stored redundantly.
#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    #[serde(flatten)]
    pub stats: QueueStats,
    pub total: i64,
}

pub async fn stats(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<QueueStatsResponse>, AppError> {
    if !principal.has_permission(Permission::QueueView) {
        return Err(DocForgeError::Forbidden("missing QUEUE_VIEW permission".into()).into());
    }
    let stats = state.store.get_queue_stats().await?;
    let total = stats.total();
    Ok(Json(QueueStatsResponse { stats, total }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let user_id = if principal.has_permission(Permission::TaskViewAll) {
        None
    } else {
        Some(principal.user_id.as_str())
    };

    let tasks = state
        .store
        .list_tasks(query.status.as_deref(), user_id, query.limit)
        .await?;
    Ok(Json(tasks))
}
