//! PostgreSQL implementation of the credential store.

use crate::db::{
    errors::Result,
    models::{
        permissions::{PermissionCreateDBRequest, PermissionDBResponse},
        roles::{RoleCreateDBRequest, RoleDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
    store::CredentialStore,
};
use crate::types::{abbrev_uuid, PermissionId, RoleId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

// A user joined through user_roles -> roles -> role_permissions -> permissions. Left joins, so a
// user without roles (or a role without permissions) still yields one row with NULLs.
const USER_GRAPH_SELECT: &str = r#"
    SELECT
        u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at,
        r.id AS role_id, r.name AS role_name, r.description AS role_description, r.created_at AS role_created_at,
        p.id AS permission_id, p.name AS permission_name, p.description AS permission_description,
        p.created_at AS permission_created_at
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
"#;

const ROLE_GRAPH_SELECT: &str = r#"
    SELECT
        r.id, r.name, r.description, r.created_at,
        p.id AS permission_id, p.name AS permission_name, p.description AS permission_description,
        p.created_at AS permission_created_at
    FROM roles r
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
"#;

#[derive(Debug, Clone, FromRow)]
struct User {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct Role {
    id: RoleId,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct UserGraphRow {
    id: UserId,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role_id: Option<RoleId>,
    role_name: Option<String>,
    role_description: Option<String>,
    role_created_at: Option<DateTime<Utc>>,
    permission_id: Option<PermissionId>,
    permission_name: Option<String>,
    permission_description: Option<String>,
    permission_created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
struct RoleGraphRow {
    id: RoleId,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    permission_id: Option<PermissionId>,
    permission_name: Option<String>,
    permission_description: Option<String>,
    permission_created_at: Option<DateTime<Utc>>,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles: Vec::new(),
        }
    }
}

impl From<Role> for RoleDBResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            created_at: role.created_at,
            permissions: Vec::new(),
        }
    }
}

fn joined_permission(
    id: Option<PermissionId>,
    name: Option<String>,
    description: Option<String>,
    created_at: Option<DateTime<Utc>>,
) -> Option<PermissionDBResponse> {
    Some(PermissionDBResponse {
        id: id?,
        name: name?,
        description: description.unwrap_or_default(),
        created_at: created_at?,
    })
}

/// Fold joined rows (ordered by user) back into users with nested roles and permissions.
fn fold_user_graph(rows: Vec<UserGraphRow>) -> Vec<UserDBResponse> {
    let mut users: Vec<UserDBResponse> = Vec::new();

    for row in rows {
        if users.last().map(|u| u.id) != Some(row.id) {
            users.push(UserDBResponse {
                id: row.id,
                username: row.username,
                email: row.email,
                password_hash: row.password_hash,
                created_at: row.created_at,
                updated_at: row.updated_at,
                roles: Vec::new(),
            });
        }
        let Some(user) = users.last_mut() else { continue };

        let (Some(role_id), Some(role_name), Some(role_created_at)) = (row.role_id, row.role_name, row.role_created_at) else {
            continue;
        };

        let role = match user.roles.iter().position(|r| r.id == role_id) {
            Some(idx) => &mut user.roles[idx],
            None => {
                user.roles.push(RoleDBResponse {
                    id: role_id,
                    name: role_name,
                    description: row.role_description.unwrap_or_default(),
                    created_at: role_created_at,
                    permissions: Vec::new(),
                });
                let last = user.roles.len() - 1;
                &mut user.roles[last]
            }
        };

        if let Some(permission) = joined_permission(
            row.permission_id,
            row.permission_name,
            row.permission_description,
            row.permission_created_at,
        ) {
            if !role.permissions.iter().any(|p| p.id == permission.id) {
                role.permissions.push(permission);
            }
        }
    }

    users
}

/// Fold joined rows (ordered by role) back into roles with their permissions.
fn fold_role_graph(rows: Vec<RoleGraphRow>) -> Vec<RoleDBResponse> {
    let mut roles: Vec<RoleDBResponse> = Vec::new();

    for row in rows {
        if roles.last().map(|r| r.id) != Some(row.id) {
            roles.push(RoleDBResponse {
                id: row.id,
                name: row.name,
                description: row.description,
                created_at: row.created_at,
                permissions: Vec::new(),
            });
        }
        let Some(role) = roles.last_mut() else { continue };

        if let Some(permission) = joined_permission(
            row.permission_id,
            row.permission_name,
            row.permission_description,
            row.permission_created_at,
        ) {
            role.permissions.push(permission);
        }
    }

    roles
}

/// Credential store backed by a PostgreSQL connection pool.
///
/// Every call checks a connection out of the pool, so one store handle can be shared by all
/// request tasks.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl CredentialStore for PgCredentialStore {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserDBResponse::from(user))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_user_by_id(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let sql = format!("{USER_GRAPH_SELECT} WHERE u.id = $1 ORDER BY r.name, p.name");
        let rows = sqlx::query_as::<_, UserGraphRow>(&sql).bind(id).fetch_all(&self.pool).await?;

        Ok(fold_user_graph(rows).into_iter().next())
    }

    #[instrument(skip(self), err)]
    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let sql = format!("{USER_GRAPH_SELECT} WHERE u.username = $1 ORDER BY r.name, p.name");
        let rows = sqlx::query_as::<_, UserGraphRow>(&sql)
            .bind(username)
            .fetch_all(&self.pool)
            .await?;

        Ok(fold_user_graph(rows).into_iter().next())
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let sql = format!("{USER_GRAPH_SELECT} ORDER BY u.created_at, u.id, r.name, p.name");
        let rows = sqlx::query_as::<_, UserGraphRow>(&sql).fetch_all(&self.pool).await?;

        Ok(fold_user_graph(rows))
    }

    #[instrument(skip(self, request), fields(role = %request.name), err)]
    async fn create_role(&self, request: &RoleCreateDBRequest) -> Result<RoleDBResponse> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(RoleDBResponse::from(role))
    }

    #[instrument(skip(self), err)]
    async fn get_role_by_name(&self, name: &str) -> Result<Option<RoleDBResponse>> {
        let sql = format!("{ROLE_GRAPH_SELECT} WHERE r.name = $1 ORDER BY r.name, p.name");
        let rows = sqlx::query_as::<_, RoleGraphRow>(&sql)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        Ok(fold_role_graph(rows).into_iter().next())
    }

    #[instrument(skip(self, request), fields(permission = %request.name), err)]
    async fn create_permission(&self, request: &PermissionCreateDBRequest) -> Result<PermissionDBResponse> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(
            r#"
            INSERT INTO permissions (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(permission)
    }

    #[instrument(skip(self), err)]
    async fn get_permission_by_name(&self, name: &str) -> Result<Option<PermissionDBResponse>> {
        let permission = sqlx::query_as::<_, PermissionDBResponse>(
            "SELECT id, name, description, created_at FROM permissions WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(permission)
    }

    #[instrument(skip(self), err)]
    async fn list_permissions(&self) -> Result<Vec<PermissionDBResponse>> {
        let permissions =
            sqlx::query_as::<_, PermissionDBResponse>("SELECT id, name, description, created_at FROM permissions ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        Ok(permissions)
    }

    #[instrument(skip(self, permission_ids), fields(role_id = %abbrev_uuid(&role_id), count = permission_ids.len()), err)]
    async fn add_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<u64> {
        if permission_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, permission_ids), fields(role_id = %abbrev_uuid(&role_id), count = permission_ids.len()), err)]
    async fn remove_role_permissions(&self, role_id: RoleId, permission_ids: &[PermissionId]) -> Result<u64> {
        if permission_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = ANY($2)")
            .bind(role_id)
            .bind(permission_ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self, role_ids), fields(user_id = %abbrev_uuid(&user_id), count = role_ids.len()), err)]
    async fn add_user_roles(&self, user_id: UserId, role_ids: &[RoleId]) -> Result<u64> {
        if role_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
