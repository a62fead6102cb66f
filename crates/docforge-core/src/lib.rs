pub mod error;
pub mod principal;
pub mod task;

pub use error::{DispatchFailure, DocForgeError, Result};
pub use principal::{Permission, Principal, Role};
pub use task::{NewTask, QueueStats, Task, TaskStatus, DEFAULT_MAX_RETRIES, DEFAULT_RETENTION_DAYS};
