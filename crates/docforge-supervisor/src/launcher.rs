//! Ordered child-process launch, readiness probing and graceful shutdown,
//! ported from `original_source/backend/start_all.py`'s `TianshuLauncher`.

use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time::sleep;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

struct Managed {
    name: &'static str,
    child: Child,
}

/// Tracks every subprocess the supervisor has started, in launch order,
/// so shutdown can walk them in reverse (last up, first down) the same
/// way `TianshuLauncher.stop_services` does.
#[derive(Default)]
pub struct Launcher {
    children: Vec<Managed>,
}

impl Launcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `cmd` and records it under `name`. Returns an error if the
    /// process fails to start at all (the caller treats this the same as
    /// an early exit: tear everything already running back down).
    pub fn spawn(&mut self, name: &'static str, mut cmd: Command) -> anyhow::Result<()> {
        let child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to start {name}: {e}"))?;
        tracing::info!(name, pid = child.id(), "started child process");
        self.children.push(Managed { name, child });
        Ok(())
    }

    /// Polls `proc.poll() is not None`-equivalent: true once the named
    /// process has exited. Used right after spawning to catch processes
    /// that die during their own warmup sleep.
    pub fn has_exited(&mut self, name: &str) -> bool {
        self.children
            .iter_mut()
            .find(|m| m.name == name)
            .map(|m| matches!(m.child.try_wait(), Ok(Some(_))))
            .unwrap_or(true)
    }

    /// Fixed warmup sleep, matching the teacher's `time.sleep(N)` between
    /// launching a service and trusting it is up.
    pub async fn warmup(seconds: u64) {
        sleep(Duration::from_secs(seconds)).await;
    }

    /// Polls `url` until it returns any HTTP response or `timeout` elapses,
    /// mirroring `wait_for_vllm`'s poll of `GET /v1/models` every 2s.
    pub async fn wait_for_http_ready(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if client.get(url).send().await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_secs(2)).await;
        }
    }

    /// Blocks until any tracked child exits, returning its name. This is
    /// the steady-state monitoring loop: "if any child dies unexpectedly,
    /// shut down everything."
    pub async fn run_until_any_exits(&mut self) -> &'static str {
        loop {
            for m in self.children.iter_mut() {
                if let Ok(Some(status)) = m.child.try_wait() {
                    tracing::warn!(name = m.name, ?status, "child exited unexpectedly");
                    return m.name;
                }
            }
            sleep(Duration::from_millis(500)).await;
        }
    }

    /// Reverse-order graceful-then-forceful shutdown: SIGTERM every child
    /// (newest first), give each up to `SHUTDOWN_GRACE` to exit, then
    /// SIGKILL any still alive.
    pub async fn shutdown(&mut self) {
        for m in self.children.iter().rev() {
            if let Some(pid) = m.child.id() {
                tracing::info!(name = m.name, pid, "sending SIGTERM");
                let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        for m in self.children.iter_mut().rev() {
            match tokio::time::timeout(SHUTDOWN_GRACE, m.child.wait()).await {
                Ok(_) => tracing::info!(name = m.name, "stopped"),
                Err(_) => {
                    tracing::warn!(name = m.name, "did not stop within grace period, killing");
                    let _ = m.child.kill().await;
                    let _ = m.child.wait().await;
                }
            }
        }
    }
}
