//! Token resolution port and middleware (spec §3 "User / Permission",
//! §6 "bearer token ... resolved by the auth collaborator").
//!
//! The real auth database is out of scope (spec.md §1) — this module
//! fixes the `token -> Principal` contract and ships a development-grade
//! SQLite-backed implementation, the same way `sem_os_server`'s JWT
//! middleware stands in for a full identity provider while only the
//! `Principal` contract is load-bearing elsewhere in the server.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Extension, Request},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use docforge_core::{Principal, Role};
use serde_json::json;
use sqlx::SqlitePool;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Principal>;
}

pub struct SqliteAuthProvider {
    pool: SqlitePool,
}

impl SqliteAuthProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_tokens (
                token    TEXT PRIMARY KEY,
                user_id  TEXT NOT NULL,
                username TEXT NOT NULL,
                role     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Registers a caller's token. Intended for bootstrap/test seeding —
    /// the real deployment's auth database is provisioned out of band.
    pub async fn seed(
        &self,
        token: &str,
        user_id: &str,
        username: &str,
        role: Role,
    ) -> anyhow::Result<()> {
        let role_str = match role {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        };
        sqlx::query(
            "INSERT OR REPLACE INTO auth_tokens (token, user_id, username, role) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(username)
        .bind(role_str)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for SqliteAuthProvider {
    async fn resolve(&self, token: &str) -> Option<Principal> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT user_id, username, role FROM auth_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .ok()?;

        let (user_id, username, role) = row?;
        let role = match role.as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            _ => Role::User,
        };
        Some(Principal::new(user_id, username, role))
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

/// Extracts `Authorization: Bearer <token>`, resolves it through the
/// auth port, and injects the resulting `Principal` into request
/// extensions. 401 on anything that doesn't resolve.
pub async fn auth_middleware(
    Extension(auth): Extension<Arc<dyn AuthProvider>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing Authorization header"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("invalid Authorization header format — expected 'Bearer <token>'"))?;

    let principal = auth
        .resolve(token)
        .await
        .ok_or_else(|| unauthorized("invalid token"))?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
