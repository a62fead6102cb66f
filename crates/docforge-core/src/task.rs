//! The Task entity (spec §3) — the primary unit of orchestrated work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of retryable `fail()` calls before a task is terminal.
/// Overridable via `DOCFORGE_MAX_RETRIES` at the store layer.
pub const DEFAULT_MAX_RETRIES: i64 = 3;

/// Default retention window, in days, for `cleanup_old_task_records`.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A unit of preprocessing work, persistent from submit to GC (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub backend: String,
    /// Opaque engine options, serialized as JSON.
    pub options: serde_json::Value,
    pub priority: i64,
    pub user_id: String,

    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub retry_count: i64,
    pub error_message: Option<String>,
    pub result_path: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Per-status task counts (spec §3 "Queue stats").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed + self.cancelled
    }

    pub fn record(&mut self, status: TaskStatus, count: i64) {
        match status {
            TaskStatus::Pending => self.pending = count,
            TaskStatus::Processing => self.processing = count,
            TaskStatus::Completed => self.completed = count,
            TaskStatus::Failed => self.failed = count,
            TaskStatus::Cancelled => self.cancelled = count,
        }
    }
}

/// Fields required to create a new task (spec §4.1 `create_task`).
#[derive(Debug, Clone)]
pub struct NewTask {
    pub file_name: String,
    pub file_path: String,
    pub backend: String,
    pub options: serde_json::Value,
    pub priority: i64,
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            let parsed: TaskStatus = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
