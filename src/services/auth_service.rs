//! Domain service for authentication.
//!
//! Handles login (including the master bootstrap and self-heal rules),
//! signup with the admin-approval gate, and the registration toggle.

use serde::Serialize;
use thiserror::Error;

use crate::models::UserRecord;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No account exists for the given email.
    #[error("No account found for this email")]
    UnknownEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The account has been banned by an administrator.
    #[error("This account has been banned")]
    AccountBanned,

    /// The account exists but has not been approved yet.
    #[error("This account is awaiting admin approval")]
    PendingApproval,

    #[error("Registration is currently closed")]
    RegistrationClosed,

    #[error("An account with this email already exists")]
    EmailAlreadyRegistered,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Directory(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Directory(err.to_string())
    }
}

/// Result of a successful signup. Accounts created under the approval gate
/// exist in the directory but do not get a session until approved.
#[derive(Debug, Clone, Serialize)]
pub struct SignupOutcome {
    pub user: UserRecord,
    pub requires_approval: bool,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and applies the account gates.
    ///
    /// The master email bootstraps itself on first login: if no record
    /// exists for it, one is created as an approved administrator using the
    /// supplied password. An existing master record that lost its admin role
    /// is promoted back on login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEmail`] when no record exists,
    /// [`AuthError::InvalidCredentials`] on a wrong password, and
    /// [`AuthError::AccountBanned`] / [`AuthError::PendingApproval`] when
    /// the respective gate applies.
    async fn login(&self, email: &str, password: &str) -> Result<UserRecord, AuthError>;

    /// Creates a new account.
    ///
    /// The first account ever created, and any account using the master
    /// email, becomes an approved administrator. Everyone else starts
    /// unapproved and pending, and is told so via
    /// [`SignupOutcome::requires_approval`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RegistrationClosed`] when the toggle is off
    /// (the bootstrap account is exempt) and
    /// [`AuthError::EmailAlreadyRegistered`] on a duplicate email.
    async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SignupOutcome, AuthError>;

    /// Fetches the current record for a logged-in user, re-applying the
    /// gates so a ban or un-approval takes effect mid-session.
    async fn current_user(&self, id: i32) -> Result<UserRecord, AuthError>;
}
