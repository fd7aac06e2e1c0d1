use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::process_logs;
use crate::models::{StatusPatch, UserRecord};

pub mod migrator;
pub mod repositories;

pub use repositories::process_log::ProcessLogEntry;
pub use repositories::user::NewUser;

/// The directory boundary: every collection read/write goes through here,
/// and any failure surfaces to callers as a retryable directory error.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") && !db_url.contains("memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn process_log_repo(&self) -> repositories::process_log::ProcessLogRepository {
        repositories::process_log::ProcessLogRepository::new(self.conn.clone())
    }

    fn settings_repo(&self) -> repositories::settings::SettingsRepository {
        repositories::settings::SettingsRepository::new(self.conn.clone())
    }

    // === Users ===

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<UserRecord>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.user_repo().list().await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn insert_user(&self, new_user: NewUser) -> Result<UserRecord> {
        self.user_repo().insert(new_user).await
    }

    pub async fn verify_user_password(&self, email: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(email, password).await
    }

    pub async fn apply_user_status_patch(
        &self,
        id: i32,
        patch: StatusPatch,
    ) -> Result<Option<UserRecord>> {
        self.user_repo().apply_status_patch(id, patch).await
    }

    pub async fn promote_user_to_admin(&self, id: i32) -> Result<Option<UserRecord>> {
        self.user_repo().promote_to_admin(id).await
    }

    pub async fn touch_last_login(&self, id: i32) -> Result<()> {
        self.user_repo().touch_last_login(id).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    // === Process logs ===

    pub async fn add_process_log(&self, entry: ProcessLogEntry) -> Result<()> {
        self.process_log_repo().add(entry).await
    }

    pub async fn list_process_logs(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<process_logs::Model>, u64)> {
        self.process_log_repo().list(page, page_size).await
    }

    // === Settings ===

    pub async fn registration_open(&self) -> Result<bool> {
        self.settings_repo().registration_open().await
    }

    pub async fn set_registration_open(&self, is_open: bool) -> Result<()> {
        self.settings_repo().set_registration_open(is_open).await
    }
}
