//! Health probe and the admin-only directory sync trigger.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::json;
use storelife_core::entities::{EntityStore, MemoryEntityStore};
use storelife_core::error::{StoreError, StoreResult};
use storelife_core::models::entity::EntityRecord;
use storelife_core::status::EntityType;

/// Entity store whose database is unreachable.
struct DownStore(MemoryEntityStore);

#[async_trait]
impl EntityStore for DownStore {
    async fn create(&self, t: EntityType, name: &str) -> StoreResult<EntityRecord> {
        self.0.create(t, name).await
    }
    async fn get(&self, t: EntityType, id: &str) -> StoreResult<Option<EntityRecord>> {
        self.0.get(t, id).await
    }
    async fn list(&self, t: EntityType) -> StoreResult<Vec<EntityRecord>> {
        self.0.list(t).await
    }
    async fn update_status(
        &self,
        t: EntityType,
        id: &str,
        from: &str,
        to: &str,
    ) -> StoreResult<Option<EntityRecord>> {
        self.0.update_status(t, id, from, to).await
    }
    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = common::app();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["cache"], "connected");
    assert_eq!(body["version"], storelife_core::version());
}

#[tokio::test]
async fn health_reports_degraded_database() {
    let app = common::builder()
        .entities(Arc::new(DownStore(MemoryEntityStore::new())))
        .build();
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["cache"], "connected");
}

#[tokio::test]
async fn sync_requires_admin() {
    let app = common::builder().with_directory().build();

    let (status, _) = app.send("POST", "/admin/directory/sync", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.manager_token().await;
    let (status, body) = app
        .send("POST", "/admin/directory/sync", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn admin_triggers_full_sync() {
    let app = common::builder().with_directory().build();
    let token = app.admin_token().await;

    let (status, body) = app
        .send("POST", "/admin/directory/sync", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["kind"], "full");
    assert_eq!(body["success"], true);
    assert_eq!(body["counts"]["departments"]["created"], 1);
    assert_eq!(body["counts"]["users"]["created"], 1);
    assert_eq!(body["errors"], json!([]));
    assert!(body["duration"].is_u64());

    // Synced users can sign in with WeCom straight away.
    let (status, _) = app
        .send(
            "POST",
            "/auth/wecom/login",
            None,
            Some(json!({"code": "code-zhangsan"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // A second full run changes nothing.
    let (_, body) = app
        .send(
            "POST",
            "/admin/directory/sync",
            Some(&token),
            Some(json!({"kind": "full"})),
        )
        .await;
    assert_eq!(body["counts"]["users"]["unchanged"], 1);
    assert_eq!(app.users.user_count(), 3);
}

#[tokio::test]
async fn admin_triggers_incremental_sync() {
    let app = common::builder().with_directory().build();
    let token = app.admin_token().await;

    app.send("POST", "/admin/directory/sync", Some(&token), None)
        .await;
    let (status, body) = app
        .send(
            "POST",
            "/admin/directory/sync",
            Some(&token),
            Some(json!({"kind": "incremental"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "incremental");
    assert_eq!(body["counts"]["users"]["skipped"], 1);
}

#[tokio::test]
async fn malformed_sync_request_is_rejected() {
    let app = common::builder().with_directory().build();
    let token = app.admin_token().await;
    let (status, body) = app
        .send(
            "POST",
            "/admin/directory/sync",
            Some(&token),
            Some(json!({"kind": "weekly"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn sync_without_directory_is_unavailable() {
    let app = common::app();
    let token = app.admin_token().await;
    let (status, body) = app
        .send("POST", "/admin/directory/sync", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "external_service_unavailable");
}

#[tokio::test]
async fn sync_of_same_kind_in_flight_is_conflict() {
    let directory = Arc::new(common::GatedDirectory::new());
    let app = Arc::new(common::builder().directory(directory.clone()).build());
    let token = app.admin_token().await;

    let first = {
        let app = app.clone();
        let token = token.clone();
        tokio::spawn(async move {
            app.send("POST", "/admin/directory/sync", Some(&token), None)
                .await
        })
    };
    directory.parked.notified().await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/directory/sync",
            Some(&token),
            Some(json!({"kind": "full"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "sync_in_progress");

    // The guard is per kind.
    let (status, body) = app
        .send(
            "POST",
            "/admin/directory/sync",
            Some(&token),
            Some(json!({"kind": "incremental"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    directory.release.notify_one();
    let (status, body) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["kind"], "full");
}
