//! Route composition: public vs. bearer-authenticated, mirroring
//! `sem_os_server::router::build_router`'s merged-`Router` + `Extension`
//! layering.

use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{delete, get, post},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{auth_middleware, AuthProvider};
use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>, auth: Arc<dyn AuthProvider>) -> Router {
    let protected = Router::new()
        .route("/api/v1/tasks/submit", post(handlers::submit::submit))
        .route("/api/v1/tasks/:id", get(handlers::status::get_status))
        .route("/api/v1/tasks/:id", delete(handlers::cancel::cancel))
        .route("/api/v1/queue/stats", get(handlers::queue::stats))
        .route("/api/v1/queue/tasks", get(handlers::queue::list))
        .route("/api/v1/admin/cleanup", post(handlers::admin::cleanup))
        .route("/api/v1/admin/reset-stale", post(handlers::admin::reset_stale))
        .layer(axum_mw::from_fn(auth_middleware))
        .layer(Extension(auth));

    let public = Router::new()
        .route("/api/v1/engines", get(handlers::engines::engines))
        .route("/api/v1/health", get(handlers::health::health))
        .route("/v1/files/output/*path", get(handlers::files::serve_output_file));

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
