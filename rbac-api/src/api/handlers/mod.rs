//! HTTP request handlers for all API endpoints.
//!
//! Handlers under `/api` receive the caller as a [`CurrentUser`](crate::api::models::users::CurrentUser)
//! extractor. Permission checks happen in route layers before the handler runs, so a handler
//! only sees callers that are already allowed in.
//!
//! - [`auth`]: Registration and login
//! - [`users`]: Current user, user listing and creation
//! - [`posts`]: The posts resource

use axum::Json;
use axum_extra::extract::WithRejection;

use crate::errors::Error;

pub mod auth;
pub mod posts;
pub mod users;

/// JSON request body whose parse failures surface as [`Error::Validation`] (400) rather than
/// axum's default 422.
pub type JsonBody<T> = WithRejection<Json<T>, Error>;
