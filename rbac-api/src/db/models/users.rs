//! Store models for users.

use crate::db::models::roles::RoleDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A user with roles and each role's permissions loaded
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<RoleDBResponse>,
}
