//! docforge-worker — standalone HTTP service hosting device-pinned
//! engine singletons (spec §4.2).
//!
//! Reads config from env vars:
//!   WORKER_PORT        — listen port (default 8001)
//!   OUTPUT_PATH        — result artifact root (default ./output)
//!   CHUNK_SIZE         — page threshold before PDF pre-splitting (default 20)
//!   DEVICES            — "auto" or a comma-separated device list (default "auto")
//!   ACCELERATOR        — device name prefix, e.g. "cuda" (default "auto" -> cpu)
//!   WORKERS_PER_DEVICE — worker slots per device (default 1)

use std::path::PathBuf;
use std::sync::Arc;

use docforge_worker::{build_router, pdf::NoopPdfSplitter, pool::{parse_devices, DevicePool}, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,docforge_worker=debug".into()),
        )
        .init();

    let worker_port: u16 = std::env::var("WORKER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8001);
    let output_root: PathBuf = std::env::var("OUTPUT_PATH")
        .unwrap_or_else(|_| "./output".into())
        .into();
    let chunk_size: u32 = std::env::var("CHUNK_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);
    let devices_spec = std::env::var("DEVICES").unwrap_or_else(|_| "auto".into());
    let accelerator = std::env::var("ACCELERATOR").unwrap_or_else(|_| "auto".into());
    let workers_per_device: usize = std::env::var("WORKERS_PER_DEVICE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    tokio::fs::create_dir_all(&output_root)
        .await
        .unwrap_or_else(|e| panic!("failed to create output dir {output_root:?}: {e}"));

    let devices = parse_devices(&devices_spec, &accelerator);
    let pool = DevicePool::new(devices, workers_per_device);

    let state = Arc::new(AppState {
        registry: Default::default(),
        splitter: Arc::new(NoopPdfSplitter),
        output_root,
        chunk_size,
        pool,
    });

    tracing::info!(
        backends = ?state.registry.known_backends(),
        devices = ?state.pool.devices(),
        worker_slots = state.pool.total_slots(),
        chunk_size,
        "engine registry ready"
    );

    let app = build_router(state);

    let bind_addr = format!("0.0.0.0:{worker_port}");
    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("docforge-worker listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}
