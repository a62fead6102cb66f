//! `GET /api/v1/health` (spec §6 "DB probe + stats").

use std::sync::Arc;

use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let stats = state.store.get_queue_stats().await?;
    let total = stats.total();
    Ok(Json(json!({
        "status": "ok",
        "queue": stats,
        "queue_total": total,
    })))
}
