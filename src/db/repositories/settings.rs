use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use crate::entities::settings;

const REGISTRATION: &str = "registration";

pub struct SettingsRepository {
    conn: DatabaseConnection,
}

impl SettingsRepository {
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Whether new signups are accepted. A missing row reads as open.
    pub async fn registration_open(&self) -> Result<bool> {
        let row = settings::Entity::find_by_id(REGISTRATION)
            .one(&self.conn)
            .await
            .context("Failed to read registration setting")?;

        Ok(row.is_none_or(|r| r.is_open))
    }

    pub async fn set_registration_open(&self, is_open: bool) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let existing = settings::Entity::find_by_id(REGISTRATION)
            .one(&self.conn)
            .await
            .context("Failed to read registration setting")?;

        match existing {
            Some(row) => {
                let mut active: settings::ActiveModel = row.into();
                active.is_open = Set(is_open);
                active.updated_at = Set(now);
                active
                    .update(&self.conn)
                    .await
                    .context("Failed to update registration setting")?;
            }
            None => {
                let active = settings::ActiveModel {
                    name: Set(REGISTRATION.to_string()),
                    is_open: Set(is_open),
                    updated_at: Set(now),
                };
                active
                    .insert(&self.conn)
                    .await
                    .context("Failed to insert registration setting")?;
            }
        }

        Ok(())
    }
}
