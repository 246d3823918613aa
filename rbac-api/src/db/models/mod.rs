//! Store record models.
//!
//! These structs describe what the [`CredentialStore`](crate::db::CredentialStore) accepts and
//! returns. They are distinct from the API models in [`crate::api::models`] so that the password
//! hash can never leak into a response by accident: only the store-side [`users::UserDBResponse`]
//! carries it.
//!
//! - [`users`]: User accounts with their role graph
//! - [`roles`]: Roles with their granted permissions
//! - [`permissions`]: Permission reference data

pub mod permissions;
pub mod roles;
pub mod users;
