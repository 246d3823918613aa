//! Permission checks over a user's effective permission set.
//!
//! A user's effective permissions are the union of the permissions granted by each of their
//! roles. There are no negative grants, so adding a role can only widen the set.
//!
//! Routes are gated with [`enforce`] as a route layer:
//!
//! ```ignore
//! Router::new().route(
//!     "/users",
//!     get(list_users).route_layer(middleware::from_fn_with_state(RequiredPermission("user:read"), enforce)),
//! )
//! ```
//!
//! The gate does no store access of its own. It relies on
//! [`resolve_identity`](crate::auth::identity::resolve_identity) having attached a
//! [`CurrentUser`] to the request first.

use std::collections::BTreeSet;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument};

use crate::{
    api::models::users::CurrentUser,
    db::models::roles::RoleDBResponse,
    errors::{AuthFailure, Error, Result},
};

/// The permission a route requires, used as the state of its [`enforce`] layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredPermission(pub &'static str);

/// Union of permission names over all roles.
pub fn effective_permissions(roles: &[RoleDBResponse]) -> BTreeSet<String> {
    roles
        .iter()
        .flat_map(|role| role.permissions.iter().map(|p| p.name.clone()))
        .collect()
}

/// Check that the user holds the named permission.
pub fn require_permission(user: &CurrentUser, permission: &str) -> Result<()> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            permission: permission.to_string(),
        })
    }
}

/// Route layer that lets the request through only if the resolved user holds the required
/// permission.
#[instrument(skip_all, fields(permission = required.0))]
pub async fn enforce(State(required): State<RequiredPermission>, request: Request, next: Next) -> Result<Response> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(Error::Unauthenticated {
            reason: AuthFailure::NotAuthenticated,
        })?;

    require_permission(user, required.0)?;
    debug!(user = %user.username, "permission granted");

    Ok(next.run(request).await)
}
