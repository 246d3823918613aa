//! The credential store trait.
//!
//! A credential store is the data access layer for users, roles, permissions and the two join
//! relations between them. It exposes creation, unique-keyed lookups, filtered listings and
//! set-style association edits (add/remove edges). Nothing above this layer knows which engine
//! sits underneath.
//!
//! Uniqueness of usernames, emails, role names and permission names is the store's job: a
//! conflicting create must fail with [`DbError::UniqueViolation`](crate::db::errors::DbError)
//! rather than being checked by the caller first.

use crate::db::errors::Result;
use crate::db::models::{
    permissions::{PermissionCreateDBRequest, PermissionDBResponse},
    roles::{RoleCreateDBRequest, RoleDBResponse},
    users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{PermissionId, RoleId, UserId};

/// Storage operations for the RBAC data model.
///
/// User lookups always return the user with its roles and each role's permissions loaded, in
/// one logical fetch.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create a new user with no roles
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    /// Get a user by ID
    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Get a user by username
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// List all users, oldest first
    async fn list_users(&self) -> Result<Vec<UserDBResponse>>;

    /// Create a new role with no permissions
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse>;

    /// Get a role by its unique name
    async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>>;

    /// Create a new permission
    async fn create_permission(&self, request: &PermissionCreateDBRequest) -> Result<PermissionDBResponse>;

    /// Get a permission by its unique name
    async fn get_permission_by_name(&self, name: &str) -> Result<Option<PermissionDBResponse>>;

    /// List all permissions ordered by name
    async fn list_permissions(&self) -> Result<Vec<PermissionDBResponse>>;

    /// Grant permissions to a role. Existing edges are left alone; returns the number added.
    async fn add_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<u64>;

    /// Revoke permissions from a role; returns the number removed.
    async fn remove_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<u64>;

    /// Assign roles to a user. Existing edges are left alone; returns the number added.
    async fn add_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> Result<u64>;
}
