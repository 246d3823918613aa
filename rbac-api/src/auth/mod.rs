//! Authentication and authorization.
//!
//! # Authentication
//!
//! Clients exchange a username and password at `/login` for a signed bearer token, and send it
//! back as `Authorization: Bearer <token>` on every request under `/api`. The token only names the
//! user; roles and permissions are loaded from the store on each request, so a revoked role takes
//! effect immediately.
//!
//! # Authorization
//!
//! A user holds roles, a role grants permissions, and a route requires one permission by name
//! (`<resource>:<action>`, e.g. `user:create`). Grants are purely additive.
//!
//! # Modules
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`token`]: JWT issuance and validation
//! - [`identity`]: Bearer token → [`CurrentUser`](crate::api::models::users::CurrentUser) middleware and extractor
//! - [`permissions`]: Effective permission sets and the per-route gate
//! - [`accounts`]: Registration and login flows

pub mod accounts;
pub mod identity;
pub mod password;
pub mod permissions;
pub mod token;
