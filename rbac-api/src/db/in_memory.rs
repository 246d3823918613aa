//! In-memory credential store.
//!
//! All tables live behind a single lock, which makes every operation atomic with respect to the
//! others. Suitable for tests and single-process demos; everything is lost on restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    models::{
        permissions::{PermissionCreateDBRequest, PermissionDBResponse},
        roles::{RoleCreateDBRequest, RoleDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
    store::CredentialStore,
};
use crate::types::{PermissionId, RoleId, UserId};

#[derive(Clone)]
struct StoredUser {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone)]
struct StoredRole {
    id: RoleId,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, StoredUser>,
    roles: HashMap<RoleId, StoredRole>,
    permissions: HashMap<PermissionId, PermissionDBResponse>,
    user_roles: BTreeSet<(UserId, RoleId)>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
}

fn unique_violation(table: &str, constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

fn foreign_key_violation(table: &str, constraint: &str) -> DbError {
    DbError::ForeignKeyViolation {
        constraint: Some(constraint.to_string()),
        table: Some(table.to_string()),
        message: format!("insert or update on table \"{table}\" violates foreign key constraint \"{constraint}\""),
    }
}

impl Tables {
    fn role_graph(&self, role: &StoredRole) -> RoleDBResponse {
        let mut permissions: Vec<PermissionDBResponse> = self
            .role_permissions
            .range((role.id, Uuid::nil())..=(role.id, Uuid::from_u128(u128::MAX)))
            .filter_map(|(_, permission_id)| self.permissions.get(permission_id).cloned())
            .collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));

        RoleDBResponse {
            id: role.id,
            name: role.name.clone(),
            description: role.description.clone(),
            created_at: role.created_at,
            permissions,
        }
    }

    fn user_graph(&self, user: &StoredUser) -> UserDBResponse {
        let mut roles: Vec<RoleDBResponse> = self
            .user_roles
            .range((user.id, Uuid::nil())..=(user.id, Uuid::from_u128(u128::MAX)))
            .filter_map(|(_, role_id)| self.roles.get(role_id))
            .map(|role| self.role_graph(role))
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));

        UserDBResponse {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles,
        }
    }
}

/// In-memory implementation of [`CredentialStore`].
///
/// Mirrors the relational schema's constraints: unique usernames, emails, role names and
/// permission names, and association edges that must reference existing rows.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut tables = self.tables.write();

        if tables.users.values().any(|u| u.username == request.username) {
            return Err(unique_violation("users", "users_username_key"));
        }
        if tables.users.values().any(|u| u.email == request.email) {
            return Err(unique_violation("users", "users_email_key"));
        }

        let now = Utc::now();
        let user = StoredUser {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());

        Ok(tables.user_graph(&user))
    }

    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.users.get(&id).map(|u| tables.user_graph(u)))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let tables = self.tables.read();
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .map(|u| tables.user_graph(u)))
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let tables = self.tables.read();
        let mut users: Vec<&StoredUser> = tables.users.values().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(users.into_iter().map(|u| tables.user_graph(u)).collect())
    }

    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse> {
        let mut tables = self.tables.write();

        if tables.roles.values().any(|r| r.name == request.name) {
            return Err(unique_violation("roles", "roles_name_key"));
        }

        let role = StoredRole {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            created_at: Utc::now(),
        };
        tables.roles.insert(role.id, role.clone());

        Ok(tables.role_graph(&role))
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.roles.values().find(|r| r.name == name).map(|r| tables.role_graph(r)))
    }

    async fn create_permission(&self, request: &PermissionCreateDBRequest) -> Result<PermissionDBResponse> {
        let mut tables = self.tables.write();

        if tables.permissions.values().any(|p| p.name == request.name) {
            return Err(unique_violation("permissions", "permissions_name_key"));
        }

        let permission = PermissionDBResponse {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            description: request.description.clone(),
            created_at: Utc::now(),
        };
        tables.permissions.insert(permission.id, permission.clone());

        Ok(permission)
    }

    async fn get_permission_by_name(&self, name: &str) -> Result<Option<PermissionDBResponse>> {
        let tables = self.tables.read();
        Ok(tables.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn list_permissions(&self) -> Result<Vec<PermissionDBResponse>> {
        let tables = self.tables.read();
        let mut permissions: Vec<PermissionDBResponse> = tables.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(permissions)
    }

    async fn add_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<u64> {
        let mut tables = self.tables.write();

        if !tables.roles.contains_key(&role_id) {
            return Err(foreign_key_violation("role_permissions", "role_permissions_role_id_fkey"));
        }
        if permission_ids.iter().any(|id| !tables.permissions.contains_key(id)) {
            return Err(foreign_key_violation("role_permissions", "role_permissions_permission_id_fkey"));
        }

        let added = permission_ids
            .iter()
            .filter(|id| tables.role_permissions.insert((role_id, **id)))
            .count();

        Ok(added as u64)
    }

    async fn remove_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<u64> {
        let mut tables = self.tables.write();
        let removed = permission_ids
            .iter()
            .filter(|id| tables.role_permissions.remove(&(role_id, **id)))
            .count();

        Ok(removed as u64)
    }

    async fn add_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> Result<u64> {
        let mut tables = self.tables.write();

        if !tables.users.contains_key(&user_id) {
            return Err(foreign_key_violation("user_roles", "user_roles_user_id_fkey"));
        }
        if role_ids.iter().any(|id| !tables.roles.contains_key(id)) {
            return Err(foreign_key_violation("user_roles", "user_roles_role_id_fkey"));
        }

        let added = role_ids.iter().filter(|id| tables.user_roles.insert((user_id, **id))).count();

        Ok(added as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_request(username: &str, email: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn named(name: &str) -> PermissionCreateDBRequest {
        PermissionCreateDBRequest {
            name: name.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_username_and_email_are_unique() {
        let store = InMemoryCredentialStore::new();
        store.create_user(&user_request("alice", "alice@example.com")).await.unwrap();

        let err = store.create_user(&user_request("alice", "other@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::UniqueViolation { ref constraint, .. } if constraint.as_deref() == Some("users_username_key")
        ));

        let err = store.create_user(&user_request("bob", "alice@example.com")).await.unwrap_err();
        assert!(err.is_unique_violation_on("users"));

        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_and_permission_names_are_unique() {
        let store = InMemoryCredentialStore::new();
        store.create_permission(&named("user:read")).await.unwrap();
        assert!(store.create_permission(&named("user:read")).await.unwrap_err().is_unique_violation_on("permissions"));

        let role = RoleCreateDBRequest {
            name: "admin".to_string(),
            description: "Administrator".to_string(),
        };
        store.create_role(&role).await.unwrap();
        assert!(store.create_role(&role).await.unwrap_err().is_unique_violation_on("roles"));
    }

    #[tokio::test]
    async fn test_association_edges_are_sets() {
        let store = InMemoryCredentialStore::new();
        let read = store.create_permission(&named("user:read")).await.unwrap();
        let create = store.create_permission(&named("user:create")).await.unwrap();
        let role = store
            .create_role(&RoleCreateDBRequest {
                name: "admin".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(store.add_role_permissions(role.id, &[read.id, create.id]).await.unwrap(), 2);
        assert_eq!(store.add_role_permissions(role.id, &[read.id]).await.unwrap(), 0);

        let loaded = store.get_role_by_name("admin").await.unwrap().unwrap();
        let names: Vec<_> = loaded.permissions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["user:create", "user:read"]);

        assert_eq!(store.remove_role_permissions(role.id, &[create.id, create.id]).await.unwrap(), 1);
        let loaded = store.get_role_by_name("admin").await.unwrap().unwrap();
        assert_eq!(loaded.permissions.len(), 1);
    }

    #[tokio::test]
    async fn test_user_graph_loads_roles_and_permissions() {
        let store = InMemoryCredentialStore::new();
        let read = store.create_permission(&named("post:read")).await.unwrap();
        let role = store
            .create_role(&RoleCreateDBRequest {
                name: "user".to_string(),
                description: "Regular user".to_string(),
            })
            .await
            .unwrap();
        store.add_role_permissions(role.id, &[read.id]).await.unwrap();

        let user = store.create_user(&user_request("alice", "alice@example.com")).await.unwrap();
        assert!(user.roles.is_empty());
        store.add_user_roles(user.id, &[role.id]).await.unwrap();

        let loaded = store.get_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.roles.len(), 1);
        assert_eq!(loaded.roles[0].permissions[0].name, "post:read");

        let by_name = store.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(store.get_user_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edges_must_reference_existing_rows() {
        let store = InMemoryCredentialStore::new();
        let user = store.create_user(&user_request("alice", "alice@example.com")).await.unwrap();

        let err = store.add_user_roles(user.id, &[Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        let err = store.add_role_permissions(Uuid::new_v4(), &[]).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
