//! WeCom directory integration.
//!
//! [`DirectorySource`] is the remote side (departments, users, SSO code
//! exchange); [`store::DirectoryStore`] is the local mirror keyed by external
//! id. [`sync::DirectorySync`] moves data from one to the other and
//! [`schedule::SyncScheduler`] runs it on a daily/hourly cadence.

pub mod postgres;
pub mod schedule;
pub mod store;
pub mod sync;
pub mod wecom;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::StoreError;
use crate::models::directory::{DirectoryDepartment, DirectoryUser};

/// Directory integration errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory API unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Directory not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid sync schedule: {0}")]
    InvalidSchedule(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DirectoryError {
    /// Whether the failure was reaching the external service (vs. local storage).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DirectoryError::Http(_))
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Remote directory the sync job pulls from.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// All departments visible to the integration, parents before children.
    async fn list_departments(&self) -> DirectoryResult<Vec<DirectoryDepartment>>;

    /// Users whose primary listing is in `department_id`.
    async fn list_users(&self, department_id: &str) -> DirectoryResult<Vec<DirectoryUser>>;

    /// Exchange an OAuth `code` for the directory user id (SSO).
    async fn user_id_by_code(&self, code: &str) -> DirectoryResult<String>;
}
