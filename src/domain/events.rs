//! Domain events for the application.
//!
//! These events are sent via the event bus to notify connected clients
//! (the admin console's live feeds, the export overlay) of state changes.

use serde::Serialize;

/// Events sent to connected clients via SSE (Server-Sent Events).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    UserRegistered {
        email: String,
    },
    UserUpdated {
        id: i32,
    },
    UserDeleted {
        id: i32,
    },
    RegistrationToggled {
        is_open: bool,
    },

    /// A file finished loading; the activity listener persists this as a
    /// process log and the admin console refreshes its log feed.
    FileProcessed {
        file_name: String,
        user_email: String,
        user_name: String,
        file_size: i64,
        dimensions: String,
        frames: i32,
    },

    ExportStarted {
        workspace: String,
        kind: String,
    },
    ExportPhase {
        workspace: String,
        label: String,
    },
    ExportProgress {
        workspace: String,
        percent: u8,
    },
    ExportFinished {
        workspace: String,
        file_name: String,
        entries: usize,
    },
    ExportFailed {
        workspace: String,
    },
}
