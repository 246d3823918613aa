//! Data access layer for users, roles and permissions.
//!
//! ```text
//! ┌──────────────────┐
//! │ Handlers / auth  │  (api::handlers, auth::accounts, auth::identity, seed)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │ CredentialStore  │  (db::store - the trait every engine implements)
//! └────────┬─────────┘
//!          │
//!     ┌────┴─────┐
//!     ↓          ↓
//! ┌────────┐ ┌──────────┐
//! │Postgres│ │In-memory │
//! └────────┘ └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: The [`CredentialStore`] trait
//! - [`postgres`]: SQLx/PostgreSQL implementation
//! - [`in_memory`]: Lock-guarded in-process implementation
//! - [`models`]: Records accepted and returned by the store
//! - [`errors`]: Store error classification

pub mod errors;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;
pub use store::CredentialStore;
