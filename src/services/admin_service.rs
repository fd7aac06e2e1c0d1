//! Domain service for the admin console.
//!
//! User moderation (approve, ban, delete), the registration toggle, and the
//! processed-file log feed.

use serde::Serialize;
use thiserror::Error;

use crate::entities::process_logs;
use crate::models::{StatusPatch, UserRecord};

/// Errors specific to admin console operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("User not found")]
    UserNotFound,

    /// Administrators cannot delete their own account.
    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("No fields to update")]
    EmptyPatch,

    #[error("Directory error: {0}")]
    Directory(String),
}

impl From<sea_orm::DbErr> for AdminError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Directory(err.to_string())
    }
}

impl From<anyhow::Error> for AdminError {
    fn from(err: anyhow::Error) -> Self {
        Self::Directory(err.to_string())
    }
}

/// One page of the processed-file log feed, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub items: Vec<process_logs::Model>,
    pub page: u64,
    pub total_pages: u64,
}

/// Domain service trait for the admin console.
#[async_trait::async_trait]
pub trait AdminService: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>, AdminError>;

    /// Applies a partial status update to a user. Any state can move to any
    /// other; the console offers approve/ban/unban as presets over this.
    async fn set_user_status(
        &self,
        target_id: i32,
        patch: StatusPatch,
    ) -> Result<UserRecord, AdminError>;

    /// Removes a user record.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::SelfDeletion`] if `actor_id == target_id`.
    async fn delete_user(&self, actor_id: i32, target_id: i32) -> Result<(), AdminError>;

    async fn registration_open(&self) -> Result<bool, AdminError>;

    async fn set_registration_open(&self, is_open: bool) -> Result<(), AdminError>;

    /// Lists processed-file logs, newest first. `page` is 1-based.
    async fn list_logs(&self, page: u64, page_size: u64) -> Result<LogPage, AdminError>;
}
