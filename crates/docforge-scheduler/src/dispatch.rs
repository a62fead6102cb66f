//! Single-task dispatch: HTTP POST to the worker pool, then reflect the
//! outcome back into the task store (spec §4.3).
//!
//! Grounded on `sem_os_client::http::HttpClient::handle_error_response`'s
//! status-to-error classification pattern, adapted to the worker's own
//! `{success, retryable}` response envelope rather than generic HTTP
//! status codes alone.

use std::time::Duration;

use docforge_core::{DispatchFailure, Task};
use docforge_store::TaskStore;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct PredictResponse {
    success: bool,
    result_path: Option<String>,
    #[allow(dead_code)]
    markdown_file: Option<String>,
    #[allow(dead_code)]
    json_file: Option<String>,
    error: Option<String>,
    retryable: Option<bool>,
}

pub async fn dispatch_task(
    task: &Task,
    store: &dyn TaskStore,
    client: &reqwest::Client,
    worker_url: &str,
    timeout: Duration,
) {
    let outcome = client
        .post(worker_url)
        .timeout(timeout)
        .json(task)
        .send()
        .await;

    match outcome {
        Ok(response) if response.status().is_success() => {
            match response.json::<PredictResponse>().await {
                Ok(body) if body.success => {
                    let result_path = body.result_path.unwrap_or_default();
                    if let Err(e) = store.complete(&task.id, &result_path).await {
                        tracing::error!(task_id = %task.id, error = %e, "failed to record completion");
                    }
                }
                Ok(body) => {
                    let retryable = body.retryable.unwrap_or(false);
                    let message = body.error.unwrap_or_else(|| "engine reported failure".into());
                    fail(store, &task.id, &message, retryable).await;
                }
                Err(e) => {
                    // Decode failure on an otherwise-2xx response: permanent,
                    // per spec §7 "decode failure -> permanent".
                    fail(store, &task.id, &format!("decode error: {e}"), false).await;
                }
            }
        }
        Ok(response) => {
            let status = response.status();
            let classification = classify_status(status.as_u16());
            let message = format!("worker responded {status}");
            fail(
                store,
                &task.id,
                &message,
                classification == DispatchFailure::Transient,
            )
            .await;
        }
        Err(e) => {
            // Network error or timeout: transient (spec §7).
            fail(store, &task.id, &format!("dispatch error: {e}"), true).await;
        }
    }
}

fn classify_status(status: u16) -> DispatchFailure {
    if (500..600).contains(&status) {
        DispatchFailure::Transient
    } else {
        DispatchFailure::Permanent
    }
}

async fn fail(store: &dyn TaskStore, task_id: &str, message: &str, retryable: bool) {
    tracing::warn!(task_id, message, retryable, "task dispatch failed");
    if let Err(e) = store.fail(task_id, message, retryable).await {
        tracing::error!(task_id, error = %e, "failed to record failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_5xx_as_transient_and_4xx_as_permanent() {
        assert_eq!(classify_status(503), DispatchFailure::Transient);
        assert_eq!(classify_status(500), DispatchFailure::Transient);
        assert_eq!(classify_status(404), DispatchFailure::Permanent);
        assert_eq!(classify_status(400), DispatchFailure::Permanent);
    }
}
