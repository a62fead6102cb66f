//! docforge-api — authenticated HTTP front-end (spec §4.4).
//!
//! Reads config from env vars:
//!   DATABASE_PATH     — SQLite file shared with the scheduler (default ./docforge.db)
//!   AUTH_DATABASE_PATH — SQLite file for the dev auth provider (default ./docforge-auth.db)
//!   UPLOADS_PATH      — staged upload root (default ./uploads)
//!   OUTPUT_PATH       — result artifact root (default ./output)
//!   API_PORT          — listen port (default 8000)
//!   WORKER_PORT       — used to probe worker liveness for GET /api/v1/engines
//!   MINIO_ENDPOINT, MINIO_BUCKET, MINIO_SECURE — object store config

use std::path::PathBuf;
use std::sync::Arc;

use docforge_api::auth::SqliteAuthProvider;
use docforge_api::objectstore::LocalObjectStore;
use docforge_api::router::build_router;
use docforge_api::state::AppState;
use docforge_store::SqliteTaskStore;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,docforge_api=debug".into()),
        )
        .init();

    let database_path = std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./docforge.db".into());
    let auth_database_path =
        std::env::var("AUTH_DATABASE_PATH").unwrap_or_else(|_| "./docforge-auth.db".into());
    let uploads_root: PathBuf = std::env::var("UPLOADS_PATH").unwrap_or_else(|_| "./uploads".into()).into();
    let output_root: PathBuf = std::env::var("OUTPUT_PATH").unwrap_or_else(|_| "./output".into()).into();
    let api_port: u16 = std::env::var("API_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let worker_port: u16 = std::env::var("WORKER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8001);
    let minio_endpoint = std::env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "localhost:9000".into());
    let minio_bucket = std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "docforge".into());
    let minio_secure = std::env::var("MINIO_SECURE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    tokio::fs::create_dir_all(&uploads_root).await.expect("failed to create uploads dir");
    tokio::fs::create_dir_all(&output_root).await.expect("failed to create output dir");

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&format!("sqlite://{database_path}?mode=rwc"))
        .await
        .expect("failed to open task store database");
    let sqlite_store = SqliteTaskStore::new(pool);
    sqlite_store.migrate().await.expect("failed to run schema migration");

    let auth_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite://{auth_database_path}?mode=rwc"))
        .await
        .expect("failed to open auth database");
    let auth_provider = SqliteAuthProvider::new(auth_pool);
    auth_provider.migrate().await.expect("failed to run auth schema migration");

    let object_store = LocalObjectStore::new(output_root.join(".objectstore"), minio_endpoint);

    let auth: Arc<dyn docforge_api::auth::AuthProvider> = Arc::new(auth_provider);
    let state = Arc::new(AppState {
        store: Arc::new(sqlite_store),
        object_store: Arc::new(object_store),
        uploads_root,
        output_root,
        bucket: minio_bucket,
        secure: minio_secure,
        worker_health_url: format!("http://127.0.0.1:{worker_port}/health"),
        http_client: reqwest::Client::new(),
    });

    let app = build_router(state, auth);

    let bind_addr = format!("0.0.0.0:{api_port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("docforge-api listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}
