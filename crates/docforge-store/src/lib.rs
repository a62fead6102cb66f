//! Durable priority task queue (spec §4.1).
//!
//! All SQL here is runtime-checked (`sqlx::query`/`query_as`, never the
//! `sqlx::query!` compile-time macros) so the workspace never needs a live
//! database at build time — the same discipline the teacher workspace
//! documents at the top of `sem_os_postgres/src/store.rs`.

mod sqlite;

pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use docforge_core::{NewTask, QueueStats, Result, Task};

/// Storage port for the task queue. Core logic (scheduler, API handlers)
/// depends only on this trait, mirroring `sem_os_core::ports` — never on
/// `sqlx` directly outside this crate.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, new_task: NewTask) -> Result<String>;

    /// Atomically claims the highest-priority pending task (oldest
    /// `created_at` breaks ties) and transitions it to `processing`.
    /// Returns `None` if the queue is empty. See spec §8 property 2: no
    /// two concurrent callers may ever observe the same task id.
    async fn claim_next(&self, worker_id: &str) -> Result<Option<Task>>;

    /// processing -> completed. Idempotent on repeat.
    async fn complete(&self, task_id: &str, result_path: &str) -> Result<()>;

    /// processing -> pending (retry) or -> failed (terminal), depending on
    /// `retryable` and whether `retry_count` has hit the configured max.
    async fn fail(&self, task_id: &str, error_message: &str, retryable: bool) -> Result<()>;

    /// pending -> cancelled. Fails with `Conflict` from any other state.
    async fn cancel(&self, task_id: &str) -> Result<()>;

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>>;

    async fn list_tasks(
        &self,
        status: Option<&str>,
        user_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Task>>;

    async fn get_queue_stats(&self) -> Result<QueueStats>;

    /// Transitions `processing` tasks whose `started_at` predates the
    /// timeout back to `pending`. Returns the count recovered.
    async fn reset_stale_tasks(&self, timeout_minutes: i64) -> Result<u64>;

    /// Deletes task rows (and best-effort removes their upload/result
    /// directories) older than `days`. Returns the count deleted.
    async fn cleanup_old_task_records(&self, days: i64) -> Result<u64>;
}
