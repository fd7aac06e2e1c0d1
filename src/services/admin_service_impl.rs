//! `SeaORM` implementation of the `AdminService` trait.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::models::{StatusPatch, UserRecord};
use crate::services::admin_service::{AdminError, AdminService, LogPage};

pub struct SeaOrmAdminService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeaOrmAdminService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }
}

#[async_trait]
impl AdminService for SeaOrmAdminService {
    async fn list_users(&self) -> Result<Vec<UserRecord>, AdminError> {
        Ok(self.store.list_users().await?)
    }

    async fn set_user_status(
        &self,
        target_id: i32,
        patch: StatusPatch,
    ) -> Result<UserRecord, AdminError> {
        if patch.is_empty() {
            return Err(AdminError::EmptyPatch);
        }

        let user = self
            .store
            .apply_user_status_patch(target_id, patch)
            .await?
            .ok_or(AdminError::UserNotFound)?;

        info!(
            id = user.id,
            is_approved = user.is_approved,
            status = %user.status,
            "User status updated"
        );
        let _ = self
            .event_bus
            .send(NotificationEvent::UserUpdated { id: user.id });

        Ok(user)
    }

    async fn delete_user(&self, actor_id: i32, target_id: i32) -> Result<(), AdminError> {
        if actor_id == target_id {
            return Err(AdminError::SelfDeletion);
        }

        let deleted = self.store.delete_user(target_id).await?;
        if !deleted {
            return Err(AdminError::UserNotFound);
        }

        info!(id = target_id, "User deleted");
        let _ = self
            .event_bus
            .send(NotificationEvent::UserDeleted { id: target_id });

        Ok(())
    }

    async fn registration_open(&self) -> Result<bool, AdminError> {
        Ok(self.store.registration_open().await?)
    }

    async fn set_registration_open(&self, is_open: bool) -> Result<(), AdminError> {
        self.store.set_registration_open(is_open).await?;

        info!(is_open, "Registration toggle changed");
        let _ = self
            .event_bus
            .send(NotificationEvent::RegistrationToggled { is_open });

        Ok(())
    }

    async fn list_logs(&self, page: u64, page_size: u64) -> Result<LogPage, AdminError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);

        let (items, total_pages) = self.store.list_process_logs(page, page_size).await?;

        Ok(LogPage {
            items,
            page,
            total_pages,
        })
    }
}
