use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set};

use crate::entities::{prelude::*, process_logs};

/// One successful file load, as recorded for the admin console.
#[derive(Debug, Clone)]
pub struct ProcessLogEntry {
    pub file_name: String,
    pub user_email: String,
    pub user_name: String,
    pub file_size: i64,
    pub dimensions: String,
    pub frames: i32,
}

pub struct ProcessLogRepository {
    conn: DatabaseConnection,
}

impl ProcessLogRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append-only; entries are never mutated or deleted by this system.
    pub async fn add(&self, entry: ProcessLogEntry) -> Result<()> {
        let active_model = process_logs::ActiveModel {
            file_name: Set(entry.file_name),
            user_email: Set(entry.user_email),
            user_name: Set(entry.user_name),
            file_size: Set(entry.file_size),
            dimensions: Set(entry.dimensions),
            frames: Set(entry.frames),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        ProcessLogs::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert process log")?;
        Ok(())
    }

    /// Newest first, paginated. Returns the page plus the total page count.
    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<process_logs::Model>, u64)> {
        let query = ProcessLogs::find()
            .order_by_desc(process_logs::Column::CreatedAt)
            .order_by_desc(process_logs::Column::Id);

        let paginator = query.paginate(&self.conn, page_size.max(1));
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total_pages))
    }
}
