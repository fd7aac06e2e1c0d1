//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::db::repositories::user::hash_password;
use crate::db::{NewUser, Store};
use crate::domain::events::NotificationEvent;
use crate::models::{Role, UserRecord, UserStatus};
use crate::services::auth_service::{AuthError, AuthService, SignupOutcome};

const MIN_PASSWORD_LEN: usize = 6;

pub struct SeaOrmAuthService {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
    master_email: String,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        event_bus: broadcast::Sender<NotificationEvent>,
        master_email: &str,
        security: SecurityConfig,
    ) -> Self {
        Self {
            store,
            event_bus,
            master_email: master_email.to_lowercase(),
            security,
        }
    }

    fn is_master(&self, email: &str) -> bool {
        email == self.master_email
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let security = self.security.clone();

        tokio::task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .map_err(|e| AuthError::Internal(format!("Hashing task panicked: {e}")))?
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Banned wins over pending; admins bypass the approval gate.
    fn apply_gates(user: &UserRecord) -> Result<(), AuthError> {
        if user.status == UserStatus::Banned {
            return Err(AuthError::AccountBanned);
        }
        if !user.is_approved && user.role != Role::Admin {
            return Err(AuthError::PendingApproval);
        }
        Ok(())
    }

    /// First login of the master email with no record behind it: create the
    /// administrator account from the supplied password.
    async fn bootstrap_master(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let password_hash = self.hash(password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                name: "Administrator".to_string(),
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
                is_approved: true,
                status: UserStatus::Active,
            })
            .await?;

        info!(email = %user.email, "Bootstrapped master administrator account");
        let _ = self.event_bus.send(NotificationEvent::UserRegistered {
            email: user.email.clone(),
        });

        Ok(user)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let email = email.trim().to_lowercase();

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            if self.is_master(&email) {
                return self.bootstrap_master(&email, password).await;
            }
            return Err(AuthError::UnknownEmail);
        };

        let is_valid = self.store.verify_user_password(&email, password).await?;
        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        // Self-heal before gating: the master email always holds an active
        // admin account, even if the record was demoted or left pending.
        let needs_heal = user.role != Role::Admin
            || !user.is_approved
            || user.status != UserStatus::Active;
        let user = if self.is_master(&email) && needs_heal {
            warn!(email = %email, "Master account lost admin standing, restoring");
            self.store
                .promote_user_to_admin(user.id)
                .await?
                .ok_or(AuthError::UnknownEmail)?
        } else {
            user
        };

        Self::apply_gates(&user)?;

        self.store.touch_last_login(user.id).await?;

        Ok(user)
    }

    async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SignupOutcome, AuthError> {
        let name = name.trim();
        let email = email.trim().to_lowercase();

        if name.is_empty() {
            return Err(AuthError::Validation("Name cannot be empty".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyRegistered);
        }

        // Bootstrap rule: the very first account, or the master email,
        // becomes an approved administrator and bypasses the toggle.
        let is_bootstrap = self.store.count_users().await? == 0 || self.is_master(&email);

        if !is_bootstrap && !self.store.registration_open().await? {
            return Err(AuthError::RegistrationClosed);
        }

        let password_hash = self.hash(password).await?;

        let (role, is_approved, status) = if is_bootstrap {
            (Role::Admin, true, UserStatus::Active)
        } else {
            (Role::User, false, UserStatus::Pending)
        };

        let user = self
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email,
                password_hash,
                role,
                is_approved,
                status,
            })
            .await?;

        info!(email = %user.email, role = %user.role, "New account registered");
        let _ = self.event_bus.send(NotificationEvent::UserRegistered {
            email: user.email.clone(),
        });

        Ok(SignupOutcome {
            requires_approval: !is_bootstrap,
            user,
        })
    }

    async fn current_user(&self, id: i32) -> Result<UserRecord, AuthError> {
        let user = self
            .store
            .get_user_by_id(id)
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        Self::apply_gates(&user)?;

        Ok(user)
    }
}
