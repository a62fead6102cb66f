//! HTTP-level integration tests for the docforge API server.
//!
//! Unlike the Postgres-backed server this workspace takes its shape
//! from, the task store here is an embedded SQLite database, so these
//! tests run against an in-memory instance with no external service
//! required.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use docforge_api::auth::SqliteAuthProvider;
use docforge_api::objectstore::LocalObjectStore;
use docforge_api::router::build_router;
use docforge_api::state::AppState;
use docforge_core::Role;
use docforge_store::{SqliteTaskStore, TaskStore};
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

async fn test_app() -> (axum::Router, Arc<dyn TaskStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let sqlite_store = SqliteTaskStore::new(pool);
    sqlite_store.migrate().await.unwrap();
    let store: Arc<dyn TaskStore> = Arc::new(sqlite_store);

    let auth_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let auth_provider = SqliteAuthProvider::new(auth_pool);
    auth_provider.migrate().await.unwrap();
    auth_provider.seed("owner-token", "u1", "alice", Role::User).await.unwrap();
    auth_provider.seed("other-token", "u2", "bob", Role::User).await.unwrap();
    auth_provider.seed("admin-token", "u3", "root", Role::Admin).await.unwrap();

    let output_root: PathBuf = dir.path().join("output");
    let uploads_root: PathBuf = dir.path().join("uploads");
    tokio::fs::create_dir_all(&output_root).await.unwrap();
    tokio::fs::create_dir_all(&uploads_root).await.unwrap();

    let object_store = LocalObjectStore::new(output_root.join(".objectstore"), "minio.local:9000");
    let auth: Arc<dyn docforge_api::auth::AuthProvider> = Arc::new(auth_provider);

    let state = Arc::new(AppState {
        store: store.clone(),
        object_store: Arc::new(object_store),
        uploads_root,
        output_root,
        bucket: "docs".into(),
        secure: false,
        worker_health_url: "http://127.0.0.1:1/health".into(),
        http_client: reqwest::Client::new(),
    });

    (build_router(state, auth), store, dir)
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/queue/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/queue/stats")
                .header("Authorization", "Bearer does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owner_can_view_task_but_other_user_cannot() {
    let (app, store, _dir) = test_app().await;

    let task_id = store
        .create_task(docforge_core::NewTask {
            file_name: "a.pdf".into(),
            file_path: "/tmp/a.pdf".into(),
            backend: "auto".into(),
            options: serde_json::json!({}),
            priority: 0,
            user_id: "u1".into(),
        })
        .await
        .unwrap();

    let owner_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/tasks/{task_id}"))
                .header("Authorization", "Bearer owner-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(owner_response.status(), StatusCode::OK);

    let other_response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/tasks/{task_id}"))
                .header("Authorization", "Bearer other-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(other_response.status(), StatusCode::FORBIDDEN);

    let admin_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/tasks/{task_id}"))
                .header("Authorization", "Bearer admin-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(admin_response.status(), StatusCode::OK);
}

#[tokio::test]
async fn queue_manage_requires_admin_permission() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/admin/cleanup?days=7")
                .header("Authorization", "Bearer owner-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/admin/cleanup?days=7")
                .header("Authorization", "Bearer admin-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn queue_stats_reports_total_alongside_per_status_counts() {
    let (app, store, _dir) = test_app().await;

    for i in 0..3 {
        store
            .create_task(docforge_core::NewTask {
                file_name: format!("f{i}.pdf"),
                file_path: format!("/tmp/f{i}.pdf"),
                backend: "auto".into(),
                options: serde_json::json!({}),
                priority: 0,
                user_id: "u1".into(),
            })
            .await
            .unwrap();
    }

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/queue/stats")
                .header("Authorization", "Bearer admin-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["pending"], 3);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn health_and_engines_are_public() {
    let (app, _store, _dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/api/v1/engines").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["engines"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn static_file_traversal_is_rejected() {
    let (app, _store, dir) = test_app().await;

    // A file that exists outside the output root.
    let secret = dir.path().join("secret.txt");
    tokio::fs::write(&secret, b"nope").await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/files/output/../secret.txt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status() == StatusCode::NOT_FOUND || response.status() == StatusCode::FORBIDDEN);
}
