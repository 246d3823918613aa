//! Store models for permissions.

use crate::types::PermissionId;
use chrono::{DateTime, Utc};

/// Request for creating a new permission
#[derive(Debug, Clone)]
pub struct PermissionCreateDBRequest {
    pub name: String,
    pub description: String,
}

/// A permission as stored
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PermissionDBResponse {
    pub id: PermissionId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
