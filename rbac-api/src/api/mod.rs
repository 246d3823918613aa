//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication** (`/register`, `/login`): public
//! - **Identity** (`/api/me`): any authenticated caller
//! - **Users** (`/api/users`): gated by `user:read` / `user:create`
//! - **Posts** (`/api/posts`): gated by `post:read` / `post:create`
//!
//! The OpenAPI document is served at `/openapi.json`, with a browsable rendering at `/docs`.

pub mod handlers;
pub mod models;
