//! `GET /api/v1/engines` (spec §4.4 "supplemented" — capability
//! enumeration matching `api_server.py`'s static table plus a
//! probed/available flag).

use std::sync::Arc;

use axum::{Extension, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EngineInfo {
    pub backend: &'static str,
    pub supported_formats: &'static [&'static str],
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct EnginesResponse {
    pub engines: Vec<EngineInfo>,
}

const ENGINE_TABLE: &[(&str, &[&str])] = &[
    ("pipeline", &["pdf", "png", "jpg", "jpeg", "bmp", "tiff"]),
    ("markitdown", &["doc", "docx", "ppt", "pptx", "xls", "xlsx", "rtf"]),
    ("sensevoice", &["mp3", "wav", "flac", "m4a", "ogg"]),
    ("video", &["mp4", "mov", "avi", "mkv", "webm"]),
    ("specialized-format", &["fasta", "fa", "gb", "gbk", "genbank"]),
];

pub async fn engines(Extension(state): Extension<Arc<AppState>>) -> Json<EnginesResponse> {
    let available = state
        .http_client
        .get(&state.worker_health_url)
        .send()
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false);

    let engines = ENGINE_TABLE
        .iter()
        .map(|(backend, formats)| EngineInfo {
            backend,
            supported_formats: formats,
            available,
        })
        .collect();

    Json(EnginesResponse { engines })
}
