//! docforge-supervisor — single-command launcher for the whole stack
//! (spec §4.5), grounded on `original_source/backend/start_all.py`'s
//! `TianshuLauncher`.
//!
//! Launch order: optional VLLM sidecar, API server, worker runtime,
//! scheduler, optional MCP sidecar. Ctrl-C/SIGTERM or any child dying
//! unexpectedly triggers a reverse-order graceful-then-forceful shutdown
//! of everything already started.

mod launcher;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::process::Command;

use launcher::Launcher;

#[derive(Parser, Debug)]
#[command(name = "docforge-supervisor", about = "Launches and supervises the docforge services")]
struct Cli {
    #[arg(long, default_value = "./docforge-output")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 8000)]
    api_port: u16,

    #[arg(long, default_value_t = 8001)]
    worker_port: u16,

    #[arg(long, default_value_t = 1)]
    workers_per_device: u32,

    #[arg(long, default_value = "auto")]
    devices: String,

    #[arg(long, default_value = "auto")]
    accelerator: String,

    #[arg(long, default_value = "./docforge.db")]
    database_path: PathBuf,

    #[arg(long, default_value_t = false)]
    enable_mcp: bool,

    #[arg(long, default_value_t = 8002)]
    mcp_port: u16,

    #[arg(long, default_value_t = false)]
    start_local_vllm: bool,

    #[arg(long)]
    vllm_model_path: Option<PathBuf>,

    #[arg(long, default_value_t = 8003)]
    vllm_port: u16,

    #[arg(long, default_value_t = 0.4)]
    vllm_gpu_util: f32,

    #[arg(long, default_value_t = 8192)]
    vllm_max_model_len: u32,
}

/// Sibling binaries live next to the supervisor's own executable in the
/// same cargo target directory.
fn sibling_binary(name: &str) -> PathBuf {
    let mut path = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
    path.pop();
    path.push(name);
    path
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,docforge_supervisor=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let http = reqwest::Client::new();
    let mut launcher = Launcher::new();

    std::fs::create_dir_all(&cli.output_dir)?;

    let mut vllm_api_list: Vec<String> = Vec::new();

    if cli.start_local_vllm {
        let Some(model_path) = cli.vllm_model_path.as_ref() else {
            anyhow::bail!("--start-local-vllm requires --vllm-model-path");
        };

        let mut cmd = Command::new(std::env::var("VLLM_BIN").unwrap_or_else(|_| "vllm".into()));
        cmd.arg("serve")
            .arg(model_path)
            .arg("--port")
            .arg(cli.vllm_port.to_string())
            .arg("--gpu-memory-utilization")
            .arg(cli.vllm_gpu_util.to_string())
            .arg("--max-model-len")
            .arg(cli.vllm_max_model_len.to_string());

        launcher.spawn("vllm", cmd)?;

        let ready_url = format!("http://127.0.0.1:{}/v1/models", cli.vllm_port);
        let ready = Launcher::wait_for_http_ready(&http, &ready_url, Duration::from_secs(300)).await;
        if !ready || launcher.has_exited("vllm") {
            tracing::error!("vllm sidecar failed to become ready");
            launcher.shutdown().await;
            anyhow::bail!("vllm sidecar did not start");
        }
        vllm_api_list.push(format!("http://127.0.0.1:{}/v1", cli.vllm_port));
        tracing::info!("vllm sidecar ready at {ready_url}");
    }

    let mut api_cmd = Command::new(sibling_binary("docforge-api"));
    api_cmd
        .env("API_PORT", cli.api_port.to_string())
        .env("WORKER_PORT", cli.worker_port.to_string())
        .env("OUTPUT_PATH", &cli.output_dir)
        .env("DATABASE_PATH", &cli.database_path);
    launcher.spawn("api", api_cmd)?;
    Launcher::warmup(3).await;
    if launcher.has_exited("api") {
        tracing::error!("api server died during warmup");
        launcher.shutdown().await;
        anyhow::bail!("api server failed to start");
    }

    let mut worker_cmd = Command::new(sibling_binary("docforge-worker"));
    worker_cmd
        .env("WORKER_PORT", cli.worker_port.to_string())
        .env("OUTPUT_PATH", &cli.output_dir)
        .env("DEVICES", &cli.devices)
        .env("ACCELERATOR", &cli.accelerator)
        .env("WORKERS_PER_DEVICE", cli.workers_per_device.to_string());
    if !vllm_api_list.is_empty() {
        worker_cmd.env("VLLM_API_LIST", vllm_api_list.join(","));
    }
    launcher.spawn("worker", worker_cmd)?;
    Launcher::warmup(5).await;
    if launcher.has_exited("worker") {
        tracing::error!("worker pool died during warmup");
        launcher.shutdown().await;
        anyhow::bail!("worker pool failed to start");
    }

    let mut scheduler_cmd = Command::new(sibling_binary("docforge-scheduler"));
    scheduler_cmd
        .env("DATABASE_PATH", &cli.database_path)
        .env("WORKER_URL", format!("http://127.0.0.1:{}/predict", cli.worker_port))
        .env("WAIT_FOR_WORKERS", "true");
    launcher.spawn("scheduler", scheduler_cmd)?;
    Launcher::warmup(3).await;
    if launcher.has_exited("scheduler") {
        tracing::error!("scheduler died during warmup");
        launcher.shutdown().await;
        anyhow::bail!("scheduler failed to start");
    }

    if cli.enable_mcp {
        let mut mcp_cmd = Command::new(std::env::var("MCP_BIN").unwrap_or_else(|_| "docforge-mcp".into()));
        mcp_cmd
            .env("API_BASE_URL", format!("http://127.0.0.1:{}", cli.api_port))
            .env("MCP_PORT", cli.mcp_port.to_string())
            .env("MCP_HOST", "0.0.0.0");
        launcher.spawn("mcp", mcp_cmd)?;
        Launcher::warmup(3).await;
        if launcher.has_exited("mcp") {
            tracing::warn!("mcp server failed to start; continuing without it");
        }
    }

    tracing::info!("all services started, supervising");

    tokio::select! {
        dead = launcher.run_until_any_exits() => {
            tracing::error!(child = dead, "child process exited, shutting down the rest");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    launcher.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let ctrl_c = tokio::signal::ctrl_c();

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = ctrl_c => {}
    }
}
