//! Background listener that persists file-processing activity.
//!
//! Subscribes to the event bus and writes a process log row for every
//! successfully loaded file. High-frequency playback and progress events
//! pass through without being persisted.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::error;

use crate::db::{ProcessLogEntry, Store};
use crate::domain::events::NotificationEvent;

pub struct ActivityService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl ActivityService {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }

    pub fn start_listener(self: Arc<Self>) {
        let mut rx = self.event_bus.subscribe();
        let service = self;

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let Err(e) = service.handle_event(event).await {
                            error!(error = %e, "Failed to record activity");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        error!(count, "Activity listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Activity listener event bus closed");
                        break;
                    }
                }
            }
        });
    }

    async fn handle_event(&self, event: NotificationEvent) -> anyhow::Result<()> {
        match event {
            NotificationEvent::FileProcessed {
                file_name,
                user_email,
                user_name,
                file_size,
                dimensions,
                frames,
            } => {
                self.store
                    .add_process_log(ProcessLogEntry {
                        file_name,
                        user_email,
                        user_name,
                        file_size,
                        dimensions,
                        frames,
                    })
                    .await?;
            }

            // Everything else is transient UI signal, not activity history.
            _ => {}
        }

        Ok(())
    }
}
