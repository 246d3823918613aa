//! Store models for roles.

use crate::db::models::permissions::PermissionDBResponse;
use crate::types::RoleId;
use chrono::{DateTime, Utc};

/// Request for creating a new role
#[derive(Debug, Clone)]
pub struct RoleCreateDBRequest {
    pub name: String,
    pub description: String,
}

/// A role together with the permissions it grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDBResponse {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<PermissionDBResponse>,
}
