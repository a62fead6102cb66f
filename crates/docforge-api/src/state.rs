use std::path::PathBuf;
use std::sync::Arc;

use docforge_store::TaskStore;

use crate::objectstore::ObjectStore;

/// Shared server state injected via `Extension` (spec §4.4), mirroring
/// how `sem_os_server` threads its `CoreService` through the router.
/// The auth provider itself is injected separately (see
/// `router::build_router`) since only the authentication middleware
/// needs it.
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub object_store: Arc<dyn ObjectStore>,
    pub uploads_root: PathBuf,
    pub output_root: PathBuf,
    pub bucket: String,
    pub secure: bool,
    pub worker_health_url: String,
    pub http_client: reqwest::Client,
}
