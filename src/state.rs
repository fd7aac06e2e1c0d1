use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

use crate::animation::decoder::{MovieDecoder, ZipContainerDecoder};
use crate::animation::renderer::LayerCompositor;
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::export::ExportService;
use crate::services::{
    ActivityService, AdminService, AuthService, SeaOrmAdminService, SeaOrmAuthService,
};
use crate::workspace::WorkspaceRegistry;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub event_bus: broadcast::Sender<NotificationEvent>,

    pub workspaces: WorkspaceRegistry,

    pub decoder: Arc<dyn MovieDecoder>,

    pub auth_service: Arc<dyn AuthService>,

    pub admin_service: Arc<dyn AdminService>,

    pub export_service: Arc<ExportService>,

    pub started_at: std::time::Instant,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size);
        Self::with_event_bus(config, event_bus).await
    }

    pub async fn with_event_bus(
        config: Config,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let decoder = Arc::new(ZipContainerDecoder::new(config.max_upload_bytes()))
            as Arc<dyn MovieDecoder>;

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            event_bus.clone(),
            &config.auth.master_email,
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let admin_service = Arc::new(SeaOrmAdminService::new(store.clone(), event_bus.clone()))
            as Arc<dyn AdminService>;

        let export_service = Arc::new(ExportService::new(
            Arc::new(LayerCompositor),
            event_bus.clone(),
            Duration::from_millis(config.export.frame_settle_ms),
        ));

        let activity = Arc::new(ActivityService::new(store.clone(), event_bus.clone()));
        activity.start_listener();

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            event_bus,
            workspaces: WorkspaceRegistry::new(),
            decoder,
            auth_service,
            admin_service,
            export_service,
            started_at: std::time::Instant::now(),
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
