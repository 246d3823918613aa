//! API request and response data models.
//!
//! API models are distinct from the store models in [`crate::db::models`]; conversions between
//! the two are `From` impls that drop anything that must not leave the server.
//!
//! - [`auth`]: Registration and login payloads
//! - [`users`]: Users, roles, permissions and the resolved [`users::CurrentUser`]
//! - [`posts`]: The posts resource

pub mod auth;
pub mod posts;
pub mod users;
