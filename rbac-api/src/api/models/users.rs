//! API request/response models for users, roles and permissions.

use std::collections::BTreeSet;

use crate::db::models::{permissions::PermissionDBResponse, roles::RoleDBResponse, users::UserDBResponse};
use crate::types::{PermissionId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// User request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Name of a role to attach; ignored if no such role exists
    #[serde(default)]
    pub role: Option<String>,
}

// Response models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: PermissionId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<PermissionResponse>,
}

/// A user as returned over the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub roles: Vec<RoleResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity resolved for the current request.
///
/// Built fresh from the store on every request; `permissions` is the union of the permission
/// names granted by all of the user's roles.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub roles: Vec<RoleResponse>,
    pub permissions: BTreeSet<String>,
}

impl CurrentUser {
    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.contains(name)
    }
}

impl From<PermissionDBResponse> for PermissionResponse {
    fn from(db: PermissionDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
        }
    }
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            permissions: db.permissions.into_iter().map(PermissionResponse::from).collect(),
        }
    }
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            roles: db.roles.into_iter().map(RoleResponse::from).collect(),
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        let permissions = crate::auth::permissions::effective_permissions(&db.roles);
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            roles: db.roles.into_iter().map(RoleResponse::from).collect(),
            permissions,
        }
    }
}
