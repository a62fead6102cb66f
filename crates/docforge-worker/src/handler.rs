use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::Extension, Json};
use docforge_core::{DocForgeError, Task};
use serde::Serialize;

use crate::classify::classify_file_name;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl PredictResponse {
    fn failure(error: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            result_path: None,
            markdown_file: None,
            json_file: None,
            error: Some(error.into()),
            retryable: Some(retryable),
        }
    }
}

/// `POST /predict` (spec §4.2 "Request handling"). Payload is the full
/// task row; response is `{success, result_path, markdown_file,
/// json_file?}` or `{success:false, error, retryable}`.
pub async fn predict(
    Extension(state): Extension<Arc<AppState>>,
    Json(task): Json<Task>,
) -> Json<PredictResponse> {
    let backend = if task.backend == "auto" {
        classify_file_name(&task.file_name).preferred_backend().to_string()
    } else {
        task.backend.clone()
    };

    // Bound total concurrent engine invocations to W = devices *
    // workers_per_device (spec §4.2/§5 "accepts concurrent requests up
    // to W"). Requests beyond capacity wait here rather than at the
    // HTTP accept queue, since the scheduler already self-throttles to
    // roughly this bound and this is the worker's own backstop.
    let _slot = state.pool.acquire().await;

    // An explicit `device_id` option pins the task to a specific device;
    // otherwise the worker's own pool assigns one round-robin across its
    // configured devices (spec §4.2 "Device pinning ... is part of the
    // singleton key").
    let device_id = task
        .options
        .get("device_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| state.pool.next_device());

    let Some(engine) = state.registry.get_or_init(&backend, &device_id) else {
        tracing::error!(task_id = %task.id, backend = %backend, "unknown backend");
        return Json(PredictResponse::failure(
            format!("unknown backend: {backend}"),
            false,
        ));
    };

    let output_dir = state.output_root.join(&task.id);
    let input_path = PathBuf::from(&task.file_path);

    let result = dispatch(&*engine, &input_path, &output_dir, &task.options, &state).await;
    engine.cleanup().await;

    match result {
        Ok((markdown_file, json_file)) => Json(PredictResponse {
            success: true,
            result_path: Some(output_dir.to_string_lossy().to_string()),
            markdown_file: Some(markdown_file.to_string_lossy().to_string()),
            json_file: json_file.map(|p| p.to_string_lossy().to_string()),
            error: None,
            retryable: None,
        }),
        Err((message, retryable)) => {
            tracing::error!(task_id = %task.id, error = %message, retryable, "engine invocation failed");
            Json(PredictResponse::failure(message, retryable))
        }
    }
}

/// Runs the engine, pre-splitting PDFs above `chunk_size` pages first
/// (spec §4.2 step 3) and normalizing the image directory afterward
/// (Open Question 3).
async fn dispatch(
    engine: &dyn crate::engine::Engine,
    input_path: &std::path::Path,
    output_dir: &std::path::Path,
    options: &serde_json::Value,
    state: &AppState,
) -> Result<(PathBuf, Option<PathBuf>), (String, bool)> {
    let is_pdf = input_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if is_pdf {
        let page_count = state
            .splitter
            .page_count(input_path)
            .await
            .map_err(|e| (e.to_string(), true))?;

        if page_count > state.chunk_size {
            return dispatch_chunked(engine, input_path, output_dir, options, state, page_count).await;
        }
    }

    let output = engine
        .parse(input_path, output_dir, options)
        .await
        .map_err(classify_engine_error)?;

    if let Some(dir_name) = &output.image_dir_name {
        crate::images::normalize_image_dir(output_dir, dir_name)
            .await
            .map_err(|e| (e.to_string(), true))?;
    }

    Ok((output.markdown_file, output.json_file))
}

async fn dispatch_chunked(
    engine: &dyn crate::engine::Engine,
    input_path: &std::path::Path,
    output_dir: &std::path::Path,
    options: &serde_json::Value,
    state: &AppState,
    _page_count: u32,
) -> Result<(PathBuf, Option<PathBuf>), (String, bool)> {
    let chunks = state
        .splitter
        .split(input_path, state.chunk_size, output_dir)
        .await
        .map_err(|e| (e.to_string(), true))?;

    let mut markdown_parts = Vec::new();
    let mut json_files = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        let chunk_output_dir = output_dir.join(format!("page_{}", chunk.start_page));
        let output = engine
            .parse(&chunk.path, &chunk_output_dir, options)
            .await
            .map_err(classify_engine_error)?;

        if let Some(dir_name) = &output.image_dir_name {
            crate::images::normalize_image_dir(&chunk_output_dir, dir_name)
                .await
                .map_err(|e| (e.to_string(), true))?;
        }

        let content = tokio::fs::read_to_string(&output.markdown_file)
            .await
            .map_err(|e| (e.to_string(), true))?;
        markdown_parts.push(content);

        if let Some(json_file) = output.json_file {
            json_files.push(json_file);
        }

        tracing::debug!(chunk = i, start = chunk.start_page, end = chunk.end_page, "chunk processed");
    }

    let merged = engine.concat_markdown(&markdown_parts);
    let merged_path = output_dir.join("result.md");
    tokio::fs::write(&merged_path, merged)
        .await
        .map_err(|e| (e.to_string(), true))?;

    Ok((merged_path, json_files.into_iter().next()))
}

fn classify_engine_error(err: DocForgeError) -> (String, bool) {
    let retryable = !matches!(err, DocForgeError::EnginePermanent(_));
    (err.to_string(), retryable)
}
