//! docforge-scheduler — claims queued tasks and dispatches them to the
//! worker pool over HTTP (spec §4.3).
//!
//! Reads config from env vars:
//!   DATABASE_PATH          — SQLite file (default ./docforge.db)
//!   WORKER_URL              — worker `/predict` endpoint (default
//!                             http://127.0.0.1:8001/predict)
//!   WORKER_SLOTS            — W, total concurrent dispatches (default 4)
//!   DISPATCH_TIMEOUT_SECS   — per-task HTTP timeout (default 3600)
//!   IDLE_INTERVAL_MS        — sleep when the queue is empty (default 1000)
//!   BACKOFF_MS              — sleep when no worker slot is free (default 200)
//!   STALE_TIMEOUT_MINUTES   — processing age before a task is stale (default 30)
//!   STALE_SWEEP_INTERVAL_SECS — tick period for `reset_stale_tasks` (default 300)
//!   WAIT_FOR_WORKERS        — if "true", block on worker readiness before the first claim
//!   DRAIN_TIMEOUT_SECS      — grace period for in-flight dispatches on shutdown (default 30)
//!   DOCFORGE_MAX_RETRIES    — MAX_RETRIES before a retryable failure becomes terminal (default 3)

use std::sync::Arc;
use std::time::Duration;

use docforge_scheduler::dispatch::dispatch_task;
use docforge_store::{SqliteTaskStore, TaskStore};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

fn env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn wait_for_worker_ready(client: &reqwest::Client, worker_base: &str) {
    let health_url = format!("{worker_base}/health");
    for attempt in 1..=60 {
        if let Ok(resp) = client.get(&health_url).send().await {
            if resp.status().is_success() {
                tracing::info!("worker is ready after {attempt} probe(s)");
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    tracing::warn!("worker readiness probe timed out; proceeding anyway");
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,docforge_scheduler=debug".into()),
        )
        .init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./docforge.db".into());
    let worker_url = std::env::var("WORKER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8001/predict".into());
    let worker_base = worker_url
        .rsplit_once("/predict")
        .map(|(base, _)| base.to_string())
        .unwrap_or_else(|| worker_url.clone());

    let slots: usize = env_var("WORKER_SLOTS", 4);
    let dispatch_timeout = Duration::from_secs(env_var("DISPATCH_TIMEOUT_SECS", 3600));
    let idle_interval = Duration::from_millis(env_var("IDLE_INTERVAL_MS", 1000));
    let backoff = Duration::from_millis(env_var("BACKOFF_MS", 200));
    let stale_timeout_minutes: i64 = env_var("STALE_TIMEOUT_MINUTES", 30);
    let stale_sweep_interval = Duration::from_secs(env_var("STALE_SWEEP_INTERVAL_SECS", 300));
    let drain_timeout = Duration::from_secs(env_var("DRAIN_TIMEOUT_SECS", 30));
    let max_retries: i64 = env_var("DOCFORGE_MAX_RETRIES", docforge_core::DEFAULT_MAX_RETRIES);
    let wait_for_workers = std::env::var("WAIT_FOR_WORKERS")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let pool = SqlitePoolOptions::new()
        .max_connections((slots as u32).max(4) + 1)
        .connect(&format!("sqlite://{database_path}?mode=rwc"))
        .await
        .expect("failed to open task store database");

    let sqlite_store = SqliteTaskStore::new(pool).with_max_retries(max_retries);
    sqlite_store.migrate().await.expect("failed to run schema migration");
    let store: Arc<dyn TaskStore> = Arc::new(sqlite_store);

    let client = reqwest::Client::new();

    if wait_for_workers {
        wait_for_worker_ready(&client, &worker_base).await;
    }

    let worker_id = format!("scheduler-{}", uuid::Uuid::new_v4());
    let semaphore = Arc::new(Semaphore::new(slots));

    // Periodic stale-task recovery (spec §4.3 "Stale recovery").
    {
        let store = store.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(stale_sweep_interval);
            loop {
                tick.tick().await;
                match store.reset_stale_tasks(stale_timeout_minutes).await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(count, "recovered stale tasks"),
                    Err(e) => tracing::error!(error = %e, "stale sweep failed"),
                }
            }
        });
    }

    let mut shutdown = std::pin::pin!(shutdown_signal());
    let mut in_flight = JoinSet::new();

    tracing::info!(slots, worker_url, "scheduler starting");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutdown requested; draining in-flight dispatches");
                break;
            }
            permit = semaphore.clone().acquire_owned() => {
                let permit = permit.expect("semaphore closed unexpectedly");
                match store.claim_next(&worker_id).await {
                    Ok(Some(task)) => {
                        let store = store.clone();
                        let client = client.clone();
                        let worker_url = worker_url.clone();
                        in_flight.spawn(async move {
                            dispatch_task(&task, &*store, &client, &worker_url, dispatch_timeout).await;
                            drop(permit);
                        });
                    }
                    Ok(None) => {
                        drop(permit);
                        tokio::time::sleep(idle_interval).await;
                    }
                    Err(e) => {
                        drop(permit);
                        tracing::error!(error = %e, "claim_next failed");
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
    }

    let drained = tokio::time::timeout(drain_timeout, async {
        while in_flight.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::warn!("drain timeout elapsed with dispatches still in flight; exiting anyway");
    }
    tracing::info!("scheduler stopped");
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = term.recv() => {}
        _ = interrupt.recv() => {}
    }
}
