pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, SignupOutcome};
pub use auth_service_impl::SeaOrmAuthService;

pub mod admin_service;
pub mod admin_service_impl;
pub use admin_service::{AdminError, AdminService, LogPage};
pub use admin_service_impl::SeaOrmAdminService;

pub mod activity;
pub use activity::ActivityService;
