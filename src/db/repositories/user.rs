use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;
use crate::models::{Role, StatusPatch, UserRecord, UserStatus};

/// Fields for a record about to be created. Role/approval/status are decided
/// by the auth flow's bootstrap rule before this reaches the repository.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_approved: bool,
    pub status: UserStatus,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Look up a user by email. Callers must lowercase the email first;
    /// the column stores lowercased addresses only.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        user.map(|m| UserRecord::try_from(m).map_err(anyhow::Error::from))
            .transpose()
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<UserRecord>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        user.map(|m| UserRecord::try_from(m).map_err(anyhow::Error::from))
            .transpose()
    }

    pub async fn list(&self) -> Result<Vec<UserRecord>> {
        let models = users::Entity::find()
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        models
            .into_iter()
            .map(|m| UserRecord::try_from(m).map_err(anyhow::Error::from))
            .collect()
    }

    /// Total number of records; the bootstrap rule keys off `count() == 0`.
    pub async fn count(&self) -> Result<u64> {
        users::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count users")
    }

    pub async fn insert(&self, new_user: NewUser) -> Result<UserRecord> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            name: Set(new_user.name),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role.as_str().to_string()),
            is_approved: Set(new_user.is_approved),
            status: Set(new_user.status.as_str().to_string()),
            created_at: Set(now.clone()),
            last_login: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        UserRecord::try_from(model).map_err(anyhow::Error::from)
    }

    /// Verify a password against the stored hash for the given email.
    /// Argon2 verification runs on the blocking pool.
    pub async fn verify_password(&self, email: &str, password: &str) -> Result<bool> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let password_hash = user.password_hash;
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Apply a partial status update. Returns the updated record, or `None`
    /// if no such user exists.
    pub async fn apply_status_patch(
        &self,
        id: i32,
        patch: StatusPatch,
    ) -> Result<Option<UserRecord>> {
        let Some(user) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for status update")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        if let Some(is_approved) = patch.is_approved {
            active.is_approved = Set(is_approved);
        }
        if let Some(status) = patch.status {
            active.status = Set(status.as_str().to_string());
        }

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to update user status")?;

        Ok(Some(UserRecord::try_from(model)?))
    }

    /// Upgrade a record to admin/approved/active (master self-heal).
    pub async fn promote_to_admin(&self, id: i32) -> Result<Option<UserRecord>> {
        let Some(user) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for promotion")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        active.role = Set(Role::Admin.as_str().to_string());
        active.is_approved = Set(true);
        active.status = Set(UserStatus::Active.as_str().to_string());

        let model = active
            .update(&self.conn)
            .await
            .context("Failed to promote user")?;

        Ok(Some(UserRecord::try_from(model)?))
    }

    /// Stamp `last_login` with the current server time.
    pub async fn touch_last_login(&self, id: i32) -> Result<()> {
        let Some(user) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for login stamp")?
        else {
            return Ok(());
        };

        let mut active: users::ActiveModel = user.into();
        active.last_login = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to stamp last login")?;

        Ok(())
    }

    /// Irreversible; returns whether a record was actually removed.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
