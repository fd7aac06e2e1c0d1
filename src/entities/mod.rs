pub mod prelude;

pub mod process_logs;
pub mod settings;
pub mod users;
