//! Maps `DocForgeError` to HTTP status + JSON body, mirroring
//! `sem_os_server::error::AppError` one-for-one (spec §7).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docforge_core::DocForgeError;
use serde_json::json;

pub struct AppError(DocForgeError);

impl From<DocForgeError> for AppError {
    fn from(e: DocForgeError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error");
        }

        let body = json!({
            "error": self.0.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
