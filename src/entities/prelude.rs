pub use super::process_logs::Entity as ProcessLogs;
pub use super::settings::Entity as Settings;
pub use super::users::Entity as Users;
