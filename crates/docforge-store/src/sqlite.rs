use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use docforge_core::{
    DocForgeError, NewTask, QueueStats, Result, Task, TaskStatus, DEFAULT_MAX_RETRIES,
};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::TaskStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id            TEXT PRIMARY KEY,
    file_name     TEXT NOT NULL,
    file_path     TEXT NOT NULL,
    backend       TEXT NOT NULL,
    options       TEXT NOT NULL,
    priority      INTEGER NOT NULL DEFAULT 0,
    user_id       TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    started_at    TEXT,
    completed_at  TEXT,
    worker_id     TEXT,
    retry_count   INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    result_path   TEXT,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_claim ON tasks (status, priority DESC, created_at ASC);
CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks (user_id, created_at DESC);
"#;

/// SQLite-backed task store (spec §4.1 — "a local embedded store").
pub struct SqliteTaskStore {
    pool: SqlitePool,
    max_retries: i64,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: i64) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Runs schema creation. Safe to call on every startup (`CREATE TABLE
    /// IF NOT EXISTS`), mirroring the teacher's habit of idempotent DDL.
    pub async fn migrate(&self) -> Result<()> {
        for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        }
        Ok(())
    }
}

/// Best-effort removal of a file or directory. Missing paths are not
/// errors (spec §4.1 `cleanup_old_task_records`: "must be resilient to
/// partial filesystem state").
async fn remove_best_effort(path: &str) {
    let p = Path::new(path);
    if p.is_dir() {
        if let Err(e) = tokio::fs::remove_dir_all(p).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove result dir {path}: {e}");
            }
        }
    } else if let Err(e) = tokio::fs::remove_file(p).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove upload file {path}: {e}");
        }
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create_task(&self, new_task: NewTask) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, file_name, file_path, backend, options, priority,
                user_id, status, retry_count, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?)
            "#,
        )
        .bind(&id)
        .bind(&new_task.file_name)
        .bind(&new_task.file_path)
        .bind(&new_task.backend)
        .bind(new_task.options.to_string())
        .bind(new_task.priority)
        .bind(&new_task.user_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(id)
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<Task>> {
        // Atomic claim: BEGIN IMMEDIATE takes the write lock before the
        // inner SELECT runs, so two concurrent callers can never pick the
        // same row — the SQLite analogue of the teacher's
        // `PgOutboxStore::claim_next` CTE + `FOR UPDATE SKIP LOCKED`
        // (`sem_os_postgres/src/store.rs`), per Design Note §9's guidance
        // to fall back to `BEGIN IMMEDIATE` when the store lacks
        // SKIP LOCKED semantics.
        let mut conn = self.pool.acquire().await.map_err(|e| anyhow!(e))?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| anyhow!(e))?;

        let now = Utc::now();
        let claimed: sqlx::Result<Option<Task>> = sqlx::query_as(
            r#"
            UPDATE tasks
            SET status = 'processing', worker_id = ?, started_at = ?
            WHERE id = (
                SELECT id FROM tasks
                WHERE status = 'pending'
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await;

        match claimed {
            Ok(task) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| anyhow!(e))?;
                Ok(task)
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(anyhow!(e).into())
            }
        }
    }

    async fn complete(&self, task_id: &str, result_path: &str) -> Result<()> {
        let now = Utc::now();
        // Idempotent: re-running on an already-completed task is a no-op
        // write (same result_path), not an error.
        let res = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'completed', completed_at = ?, result_path = ?
            WHERE id = ? AND status IN ('processing', 'completed')
            "#,
        )
        .bind(now)
        .bind(result_path)
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if res.rows_affected() == 0 {
            return Err(DocForgeError::NotFound(format!("task {task_id} not found")));
        }
        Ok(())
    }

    async fn fail(&self, task_id: &str, error_message: &str, retryable: bool) -> Result<()> {
        let task = self
            .get_task(task_id)
            .await?
            .ok_or_else(|| DocForgeError::NotFound(format!("task {task_id} not found")))?;

        if retryable && task.retry_count < self.max_retries {
            sqlx::query(
                r#"
                UPDATE tasks
                SET status = 'pending', worker_id = NULL, started_at = NULL,
                    retry_count = retry_count + 1, error_message = ?
                WHERE id = ?
                "#,
            )
            .bind(error_message)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        } else {
            let now = Utc::now();
            sqlx::query(
                r#"
                UPDATE tasks
                SET status = 'failed', completed_at = ?, error_message = ?
                WHERE id = ?
                "#,
            )
            .bind(now)
            .bind(error_message)
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        }
        Ok(())
    }

    async fn cancel(&self, task_id: &str) -> Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE tasks SET status = 'cancelled' WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if res.rows_affected() == 0 {
            // Distinguish "doesn't exist" from "exists but not pending".
            return match self.get_task(task_id).await? {
                Some(_) => Err(DocForgeError::Conflict(format!(
                    "task {task_id} is not pending"
                ))),
                None => Err(DocForgeError::NotFound(format!("task {task_id} not found"))),
            };
        }
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e).into())
    }

    async fn list_tasks(
        &self,
        status: Option<&str>,
        user_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Task>> {
        let limit = limit.clamp(1, 1000);
        let rows = match (status, user_id) {
            (Some(status), Some(user_id)) => {
                sqlx::query_as::<_, Task>(
                    "SELECT * FROM tasks WHERE status = ? AND user_id = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(status)
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (Some(status), None) => {
                sqlx::query_as::<_, Task>(
                    "SELECT * FROM tasks WHERE status = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, Some(user_id)) => {
                sqlx::query_as::<_, Task>(
                    "SELECT * FROM tasks WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
            }
        };
        rows.map_err(|e| anyhow!(e).into())
    }

    async fn get_queue_stats(&self) -> Result<QueueStats> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM tasks GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            if let Ok(status) = status.parse::<TaskStatus>() {
                stats.record(status, count);
            }
        }
        Ok(stats)
    }

    async fn reset_stale_tasks(&self, timeout_minutes: i64) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::minutes(timeout_minutes);
        // `retry_count` is deliberately left untouched here — staleness is
        // a recovery signal, not a retry attempt (SPEC_FULL.md §9 / Open
        // Question 1).
        let res = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending', worker_id = NULL, started_at = NULL
            WHERE status = 'processing' AND started_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(res.rows_affected())
    }

    async fn cleanup_old_task_records(&self, days: i64) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(days);

        let victims: Vec<(String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, file_path, result_path FROM tasks
            WHERE COALESCE(completed_at, created_at) < ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if victims.is_empty() {
            return Ok(0);
        }

        for (_, file_path, result_path) in &victims {
            remove_best_effort(file_path).await;
            if let Some(result_path) = result_path {
                remove_best_effort(result_path).await;
            }
        }

        let ids: Vec<String> = victims.into_iter().map(|(id, ..)| id).collect();
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!("DELETE FROM tasks WHERE id IN ({placeholders})");
        let mut q = sqlx::query(&query);
        for id in &ids {
            q = q.bind(id);
        }
        let res = q.execute(&self.pool).await.map_err(|e| anyhow!(e))?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docforge_core::NewTask;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteTaskStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteTaskStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    fn new_task(name: &str, priority: i64) -> NewTask {
        NewTask {
            file_name: name.to_string(),
            file_path: format!("/tmp/uploads/{name}"),
            backend: "auto".to_string(),
            options: serde_json::json!({}),
            priority,
            user_id: "u1".to_string(),
        }
    }

    #[tokio::test]
    async fn claim_next_respects_priority_then_age() {
        let store = test_store().await;
        let a = store.create_task(new_task("a.pdf", 0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = store.create_task(new_task("b.pdf", 5)).await.unwrap();

        let claimed = store.claim_next("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, b);

        let claimed = store.claim_next("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, a);

        assert!(store.claim_next("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_next_is_exclusive_under_concurrency() {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = std::sync::Arc::new(SqliteTaskStore::new(pool));
        store.migrate().await.unwrap();

        for i in 0..10 {
            store
                .create_task(new_task(&format!("f{i}.pdf"), 0))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for w in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.claim_next(&format!("worker-{w}")).await.unwrap()
            }));
        }

        let mut claimed_ids = std::collections::HashSet::new();
        for h in handles {
            if let Some(task) = h.await.unwrap() {
                assert!(claimed_ids.insert(task.id), "duplicate claim observed");
            }
        }
        assert_eq!(claimed_ids.len(), 10);
    }

    #[tokio::test]
    async fn fail_retries_then_terminally_fails() {
        let store = test_store().await.with_max_retries(1);
        let id = store.create_task(new_task("a.pdf", 0)).await.unwrap();
        store.claim_next("w1").await.unwrap();

        store.fail(&id, "boom", true).await.unwrap();
        let task = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);

        store.claim_next("w1").await.unwrap();
        store.fail(&id, "boom again", true).await.unwrap();
        let task = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn cancel_only_from_pending() {
        let store = test_store().await;
        let id = store.create_task(new_task("a.pdf", 0)).await.unwrap();
        store.claim_next("w1").await.unwrap();

        let err = store.cancel(&id).await.unwrap_err();
        assert_eq!(err.http_status(), 409);
    }

    #[tokio::test]
    async fn reset_stale_tasks_preserves_retry_count() {
        let store = test_store().await;
        let id = store.create_task(new_task("a.pdf", 0)).await.unwrap();
        store.claim_next("w1").await.unwrap();
        store.fail(&id, "transient", true).await.unwrap();
        store.claim_next("w1").await.unwrap();

        // Simulate a worker that died two hours ago.
        sqlx::query("UPDATE tasks SET started_at = ? WHERE id = ?")
            .bind(Utc::now() - Duration::hours(2))
            .bind(&id)
            .execute(&store.pool)
            .await
            .unwrap();

        let reset = store.reset_stale_tasks(60).await.unwrap();
        assert_eq!(reset, 1);

        let task = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1, "stale reset must not touch retry_count");
        assert!(task.worker_id.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_rows_and_best_effort_files() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("upload.bin");
        tokio::fs::write(&upload, b"x").await.unwrap();

        let store = test_store().await;
        let mut task = new_task("a.pdf", 0);
        task.file_path = upload.to_string_lossy().to_string();
        let id = store.create_task(task).await.unwrap();
        store.claim_next("w1").await.unwrap();
        store.complete(&id, "/nonexistent/result/dir").await.unwrap();

        // Backdate completed_at past the retention window.
        sqlx::query("UPDATE tasks SET completed_at = ? WHERE id = ?")
            .bind(Utc::now() - Duration::days(10))
            .bind(&id)
            .execute(&store.pool)
            .await
            .unwrap();

        let deleted = store.cleanup_old_task_records(7).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_task(&id).await.unwrap().is_none());
        assert!(!upload.exists());
    }
}
