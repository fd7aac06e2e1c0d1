use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::entities::users;

/// Raised when a stored user document does not match the expected schema.
/// Malformed rows are rejected here instead of being trusted at use sites.
#[derive(Debug, Error)]
#[error("malformed user record {id}: {field} = {value:?}")]
pub struct MalformedRecord {
    pub id: i32,
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Banned,
    Pending,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Banned => "banned",
            Self::Pending => "pending",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "banned" => Some(Self::Banned),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User data as exposed to services and the API (never carries the hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_approved: bool,
    pub status: UserStatus,
    pub created_at: String,
    pub last_login: String,
}

impl TryFrom<users::Model> for UserRecord {
    type Error = MalformedRecord;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        let role = Role::parse(&model.role).ok_or_else(|| MalformedRecord {
            id: model.id,
            field: "role",
            value: model.role.clone(),
        })?;
        let status = UserStatus::parse(&model.status).ok_or_else(|| MalformedRecord {
            id: model.id,
            field: "status",
            value: model.status.clone(),
        })?;

        Ok(Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role,
            is_approved: model.is_approved,
            status,
            created_at: model.created_at,
            last_login: model.last_login,
        })
    }
}

/// Partial update applied by the admin console. No transition validation:
/// any state can move to any other via direct console action.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatusPatch {
    pub is_approved: Option<bool>,
    pub status: Option<UserStatus>,
}

impl StatusPatch {
    /// Preset used by the console's "approve" and "unban" actions.
    #[must_use]
    pub const fn approve() -> Self {
        Self {
            is_approved: Some(true),
            status: Some(UserStatus::Active),
        }
    }

    /// Preset used by the console's "ban" action.
    #[must_use]
    pub const fn ban() -> Self {
        Self {
            is_approved: Some(false),
            status: Some(UserStatus::Banned),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_approved.is_none() && self.status.is_none()
    }
}
