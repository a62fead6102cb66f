use std::path::PathBuf;
use std::sync::Arc;

pub mod classify;
pub mod engine;
pub mod engines;
pub mod handler;
pub mod images;
pub mod pdf;
pub mod pool;

use engine::EngineRegistry;
use pdf::PdfSplitter;
use pool::DevicePool;

/// Shared worker state injected via `Extension`, the same pattern the
/// teacher uses for its `CoreService` (`sem_os_server::router`).
pub struct AppState {
    pub registry: EngineRegistry,
    pub splitter: Arc<dyn PdfSplitter>,
    pub output_root: PathBuf,
    pub chunk_size: u32,
    pub pool: DevicePool,
}

pub fn build_router(state: Arc<AppState>) -> axum::Router {
    use axum::{extract::Extension, routing::{get, post}, Router};

    Router::new()
        .route("/predict", post(handler::predict))
        .route("/health", get(health))
        .layer(Extension(state))
}

async fn health() -> &'static str {
    "ok"
}
