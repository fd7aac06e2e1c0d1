pub mod user;

pub use user::{MalformedRecord, Role, StatusPatch, UserRecord, UserStatus};
