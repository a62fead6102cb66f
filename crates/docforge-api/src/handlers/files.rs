//! `GET /v1/files/output/<path>` — static file service with traversal
//! protection (spec §4.4 "Static file serving", §8 property 7).

use std::sync::Arc;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use docforge_core::DocForgeError;

use crate::error::AppError;
use crate::state::AppState;

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
        Some(ext) if ext == "md" => "text/markdown; charset=utf-8",
        Some(ext) if ext == "json" => "application/json",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        Some(ext) if ext == "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub async fn serve_output_file(
    Extension(state): Extension<Arc<AppState>>,
    Path(relative_path): Path<String>,
) -> Result<Response, AppError> {
    let requested = state.output_root.join(&relative_path);

    let canonical_root = tokio::fs::canonicalize(&state.output_root)
        .await
        .map_err(|e| DocForgeError::Storage(e.into()))?;

    let canonical = tokio::fs::canonicalize(&requested)
        .await
        .map_err(|_| DocForgeError::NotFound(format!("no such file: {relative_path}")))?;

    if !canonical.starts_with(&canonical_root) {
        return Err(DocForgeError::FilesystemTraversal(relative_path).into());
    }

    let content_type = content_type_for(&canonical);
    let data = tokio::fs::read(&canonical)
        .await
        .map_err(|e| DocForgeError::Storage(e.into()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_matches_known_extensions() {
        assert_eq!(content_type_for(std::path::Path::new("result.md")), "text/markdown; charset=utf-8");
        assert_eq!(content_type_for(std::path::Path::new("a.png")), "image/png");
        assert_eq!(content_type_for(std::path::Path::new("a.unknown")), "application/octet-stream");
    }
}
