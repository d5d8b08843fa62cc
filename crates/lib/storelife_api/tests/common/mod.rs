//! Shared helpers: a router over in-memory stores, driven with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use storelife_api::config::ApiConfig;
use storelife_api::{AppState, router};
use storelife_core::auth::password::hash_password;
use storelife_core::auth::{MemorySessionStore, SessionManager};
use storelife_core::directory::store::MemoryDirectoryStore;
use storelife_core::directory::sync::DirectorySync;
use storelife_core::directory::{DirectoryError, DirectoryResult, DirectorySource};
use storelife_core::entities::{EntityStore, MemoryEntityStore};
use storelife_core::models::directory::{DirectoryDepartment, DirectoryUser};
use tokio::sync::Notify;
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "admin-pass-123";
pub const MANAGER_PASSWORD: &str = "manager-pass-123";

/// Small fixed directory: one department, one member, one valid OAuth code.
pub struct FakeDirectory;

#[async_trait]
impl DirectorySource for FakeDirectory {
    async fn list_departments(&self) -> DirectoryResult<Vec<DirectoryDepartment>> {
        Ok(vec![DirectoryDepartment {
            external_id: "1".into(),
            name: "HQ".into(),
            parent_external_id: None,
            order: 1,
        }])
    }

    async fn list_users(&self, _department_id: &str) -> DirectoryResult<Vec<DirectoryUser>> {
        Ok(vec![DirectoryUser {
            external_id: "zhangsan".into(),
            name: "Zhang San".into(),
            department_ids: vec!["1".into()],
            mobile: None,
            email: None,
            position: Some("Store Manager".into()),
            enabled: true,
        }])
    }

    async fn user_id_by_code(&self, code: &str) -> DirectoryResult<String> {
        match code {
            "code-zhangsan" => Ok("zhangsan".into()),
            "code-stranger" => Ok("stranger".into()),
            _ => Err(DirectoryError::Api {
                code: 40029,
                message: "invalid code".into(),
            }),
        }
    }
}

/// [`FakeDirectory`] whose first department listing parks until released.
pub struct GatedDirectory {
    armed: AtomicBool,
    pub parked: Notify,
    pub release: Notify,
}

impl GatedDirectory {
    pub fn new() -> Self {
        Self {
            armed: AtomicBool::new(true),
            parked: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl DirectorySource for GatedDirectory {
    async fn list_departments(&self) -> DirectoryResult<Vec<DirectoryDepartment>> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.release.notified().await;
        }
        FakeDirectory.list_departments().await
    }

    async fn list_users(&self, department_id: &str) -> DirectoryResult<Vec<DirectoryUser>> {
        FakeDirectory.list_users(department_id).await
    }

    async fn user_id_by_code(&self, code: &str) -> DirectoryResult<String> {
        FakeDirectory.user_id_by_code(code).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryDirectoryStore>,
    pub sessions: Arc<SessionManager>,
}

pub struct TestAppBuilder {
    entities: Arc<dyn EntityStore>,
    directory: Option<Arc<dyn DirectorySource>>,
}

impl TestAppBuilder {
    pub fn entities(mut self, entities: Arc<dyn EntityStore>) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_directory(self) -> Self {
        self.directory(Arc::new(FakeDirectory))
    }

    pub fn directory(mut self, source: Arc<dyn DirectorySource>) -> Self {
        self.directory = Some(source);
        self
    }

    pub fn build(self) -> TestApp {
        let config = ApiConfig::for_secret("integration-test-secret");
        let users = Arc::new(MemoryDirectoryStore::new());
        users.add_account(
            "admin",
            Some(hash_password(ADMIN_PASSWORD).unwrap()),
            vec!["admin".into()],
        );
        users.add_account(
            "manager",
            Some(hash_password(MANAGER_PASSWORD).unwrap()),
            vec![],
        );

        let sessions = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            users.clone(),
            config.token_settings(),
        ));

        let sync = self
            .directory
            .as_ref()
            .map(|source| Arc::new(DirectorySync::new(source.clone(), users.clone())));

        let state = AppState {
            sessions: sessions.clone(),
            users: users.clone(),
            entities: self.entities,
            directory: self.directory,
            sync,
            config,
        };
        TestApp {
            router: router(state),
            users,
            sessions,
        }
    }
}

pub fn builder() -> TestAppBuilder {
    TestAppBuilder {
        entities: Arc::new(MemoryEntityStore::new()),
        directory: None,
    }
}

pub fn app() -> TestApp {
    builder().build()
}

impl TestApp {
    /// Send a request and return the status plus the JSON body (`Null` if empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    /// Log in and return the full token response.
    pub async fn login(&self, username: &str, password: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/auth/login",
                None,
                Some(serde_json::json!({"username": username, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body
    }

    pub async fn admin_token(&self) -> String {
        let body = self.login("admin", ADMIN_PASSWORD).await;
        body["accessToken"].as_str().unwrap().to_string()
    }

    pub async fn manager_token(&self) -> String {
        let body = self.login("manager", MANAGER_PASSWORD).await;
        body["accessToken"].as_str().unwrap().to_string()
    }
}
