pub mod process_log;
pub mod settings;
pub mod user;
