//! Device pool: derives the deployment's device ids from `--devices` /
//! `--accelerator` / `--workers-per-device` (spec §4.2 "a pool of W
//! workers across D devices (`workers_per_device × devices`), each
//! worker pinned to a specific device id") and bounds total concurrent
//! engine invocations to `W`, matching spec §5's "Worker Runtime: accepts
//! concurrent requests up to W".
//!
//! Device pinning itself — which request lands on which device — is a
//! simple round robin over the configured device list; the pinning that
//! matters for correctness is the one `engine::EngineRegistry` already
//! enforces: a `(backend, device_id)` pair always resolves to the same
//! engine singleton.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

fn default_device_name(accelerator: &str, idx: usize) -> String {
    match accelerator {
        "auto" | "cpu" | "" => format!("cpu{idx}"),
        other => format!("{other}{idx}"),
    }
}

/// Parses the supervisor's `--devices` flag. `"auto"` yields a single
/// device named from `accelerator`; a comma-separated list of plain
/// integers is expanded into `accelerator`-prefixed device names
/// (`"0,1"` + `accelerator=cuda` -> `["cuda0", "cuda1"]`); any entry that
/// isn't a plain integer is taken as a literal device id.
pub fn parse_devices(devices: &str, accelerator: &str) -> Vec<String> {
    if devices.trim().eq_ignore_ascii_case("auto") || devices.trim().is_empty() {
        return vec![default_device_name(accelerator, 0)];
    }
    devices
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(n) => default_device_name(accelerator, n),
            Err(_) => s.to_string(),
        })
        .collect()
}

/// W worker slots spread round-robin across D configured devices.
pub struct DevicePool {
    devices: Vec<String>,
    next: AtomicUsize,
    slots: Arc<Semaphore>,
    workers_per_device: usize,
}

impl DevicePool {
    pub fn new(devices: Vec<String>, workers_per_device: usize) -> Self {
        let workers_per_device = workers_per_device.max(1);
        let total = (devices.len().max(1)) * workers_per_device;
        Self {
            devices,
            next: AtomicUsize::new(0),
            slots: Arc::new(Semaphore::new(total)),
            workers_per_device,
        }
    }

    pub fn total_slots(&self) -> usize {
        self.devices.len().max(1) * self.workers_per_device
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Next device in round-robin order. Falls back to `cpu0` if no
    /// devices were configured (should not happen — `new` always keeps
    /// at least one).
    pub fn next_device(&self) -> String {
        if self.devices.is_empty() {
            return "cpu0".to_string();
        }
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.devices.len();
        self.devices[i].clone()
    }

    /// Blocks until one of the `W` worker slots is free (spec §4.2
    /// "Requests beyond capacity queue at the HTTP layer").
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        self.slots
            .clone()
            .acquire_owned()
            .await
            .expect("device pool semaphore closed unexpectedly")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_devices_yields_single_accelerator_named_device() {
        assert_eq!(parse_devices("auto", "auto"), vec!["cpu0"]);
        assert_eq!(parse_devices("auto", "cuda"), vec!["cuda0"]);
    }

    #[test]
    fn numeric_list_expands_with_accelerator_prefix() {
        assert_eq!(parse_devices("0,1,2", "cuda"), vec!["cuda0", "cuda1", "cuda2"]);
        assert_eq!(parse_devices("0,1", "cpu"), vec!["cpu0", "cpu1"]);
    }

    #[test]
    fn non_numeric_entries_pass_through_verbatim() {
        assert_eq!(parse_devices("gpu-a,gpu-b", "cuda"), vec!["gpu-a", "gpu-b"]);
    }

    #[test]
    fn total_slots_multiplies_devices_by_workers_per_device() {
        let pool = DevicePool::new(parse_devices("0,1", "cuda"), 3);
        assert_eq!(pool.total_slots(), 6);
    }

    #[test]
    fn next_device_round_robins() {
        let pool = DevicePool::new(parse_devices("0,1", "cuda"), 1);
        assert_eq!(pool.next_device(), "cuda0");
        assert_eq!(pool.next_device(), "cuda1");
        assert_eq!(pool.next_device(), "cuda0");
    }

    #[tokio::test]
    async fn acquire_bounds_concurrency_to_total_slots() {
        let pool = Arc::new(DevicePool::new(parse_devices("0", "cpu"), 2));
        let a = pool.acquire().await;
        let b = pool.acquire().await;

        let pool2 = pool.clone();
        let third = tokio::spawn(async move {
            let _permit = pool2.acquire().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!third.is_finished(), "third acquire should block while 2 slots are held");

        drop(a);
        third.await.unwrap();
        drop(b);
    }
}
