//! # rbac-api: Role-Based Access Control for a REST API
//!
//! `rbac-api` authenticates users with bearer tokens and authorizes each request by checking
//! whether the caller's roles grant a named permission.
//!
//! ## Overview
//!
//! Users hold roles and roles grant permissions named `<resource>:<action>` (for example
//! `user:create`). A user's effective permission set is the union over all of their roles.
//! Routes declare the one permission they need; nothing else is consulted.
//!
//! ### Request Flow
//!
//! 1. A client posts its username and password to `/login` and receives a signed token that
//!    names only the user.
//! 2. On every request under `/api` the client sends `Authorization: Bearer <token>`. The
//!    identity middleware ([`auth::identity`]) validates the token, loads the user with roles and
//!    permissions from the store, and attaches a typed
//!    [`CurrentUser`](api::models::users::CurrentUser) to the request.
//! 3. The route's permission gate ([`auth::permissions`]) admits the request only if the required
//!    permission is in the effective set.
//! 4. The handler runs.
//!
//! Authentication failures are a uniform 401; a missing permission is a 403 naming the
//! permission.
//!
//! ### Core Components
//!
//! - [`db`]: the [`CredentialStore`](db::CredentialStore) trait with PostgreSQL and in-memory
//!   implementations
//! - [`auth`]: password hashing, tokens, identity resolution, permission gate, registration and
//!   login
//! - [`seed`]: idempotent reconciliation of baseline permissions, roles and the bootstrap admin
//! - [`api`]: HTTP handlers and request/response models
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use rbac_api::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = rbac_api::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     rbac_api::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! With an external database, migrations run automatically on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! rbac_api::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod openapi;
pub mod seed;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
pub mod types;

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers::{auth as auth_handlers, posts, users},
    auth::{
        accounts,
        identity::resolve_identity,
        permissions::{RequiredPermission, enforce},
        token::TokenService,
    },
    config::DatabaseConfig,
    db::{CredentialStore, InMemoryCredentialStore, PgCredentialStore},
    openapi::ApiDoc,
};

pub use types::{PermissionId, RoleId, UserId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `store`: Where users, roles and permissions live
/// - `config`: Application configuration loaded from environment/files
/// - `tokens`: Token signer/validator built once from `secret_key` and `jwt_expiry`
/// - `decoy_digest`: Digest hashed with the configured Argon2 cost, verified against when a login
///   names an unknown user
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .store(Arc::new(InMemoryCredentialStore::new()))
///     .tokens(TokenService::new("secret", Duration::from_secs(3600)))
///     .decoy_digest(accounts::decoy_digest(config.auth.password.argon2_params()).await?.into())
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn CredentialStore>,
    pub config: Config,
    pub tokens: TokenService,
    pub decoy_digest: Arc<str>,
}

/// Get the database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect the configured store. For PostgreSQL this also runs migrations.
async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn CredentialStore>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            info!("Using external database");
            let pg = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .connect(url)
                .await?;
            migrator().run(&pg).await?;

            Ok((Arc::new(PgCredentialStore::new(pg.clone())), Some(pg)))
        }
        DatabaseConfig::Memory => {
            info!("Using in-memory store: data will be lost on shutdown");
            Ok((Arc::new(InMemoryCredentialStore::new()), None))
        }
    }
}

fn gate(permission: &'static str) -> RequiredPermission {
    RequiredPermission(permission)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router.
///
/// Everything under `/api` passes identity resolution first; routes that need a permission add
/// their own gate on top.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/me", get(users::me))
        .route(
            "/users",
            get(users::list_users).route_layer(from_fn_with_state(gate("user:read"), enforce)),
        )
        .route(
            "/users",
            post(users::create_user).route_layer(from_fn_with_state(gate("user:create"), enforce)),
        )
        .route(
            "/posts",
            get(posts::list_posts).route_layer(from_fn_with_state(gate("post:read"), enforce)),
        )
        .route(
            "/posts",
            post(posts::create_post).route_layer(from_fn_with_state(gate("post:create"), enforce)),
        )
        .route_layer(from_fn_with_state(state.clone(), resolve_identity));

    Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/openapi.json", get(openapi_json))
        .nest("/api", protected)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The assembled service.
///
/// 1. **Create**: [`Application::new`] connects the store, runs migrations and seeding, and
///    builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests finish and the
///    database pool is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind = %config.bind_address(), seed = config.seed.enabled, "Starting application");

        let secret = config
            .secret_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("secret_key is required"))?;
        let tokens = TokenService::new(secret, config.auth.security.jwt_expiry);

        let argon2 = config.auth.password.argon2_params();
        let decoy_digest = accounts::decoy_digest(argon2).await?;

        let (store, pool) = setup_store(&config).await?;

        if config.seed.enabled {
            let report = seed::run(store.as_ref(), &config.seed, argon2).await;
            if report.failures > 0 {
                debug!(failures = report.failures, "Continuing startup with partial seed data");
            }
        }

        let state = AppState::builder()
            .store(store)
            .config(config.clone())
            .tokens(tokens)
            .decoy_digest(decoy_digest.into())
            .build();
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[test_log::test(tokio::test)]
    async fn test_register_then_login() {
        let server = create_test_server().await;

        let response = server
            .post("/register")
            .json(&json!({"username": "alice", "email": "alice@example.com", "password": "secret1"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["username"], "alice");
        assert_eq!(body["roles"][0]["name"], "user");
        assert!(body.get("password_hash").is_none());

        let token = login_token(&server, "alice", "secret1").await;
        let me: Value = server.get("/api/me").authorization_bearer(&token).await.json();
        assert_eq!(me["username"], "alice");
        assert_eq!(me["permissions"], json!(["post:read", "user:read"]));
    }

    #[test_log::test(tokio::test)]
    async fn test_login_failures_are_uniform() {
        let server = create_test_server().await;
        register(&server, "alice", "alice@example.com", "secret1").await;

        let wrong = server
            .post("/login")
            .json(&json!({"username": "alice", "password": "wrong-password"}))
            .await;
        let unknown = server
            .post("/login")
            .json(&json!({"username": "mallory", "password": "secret1"}))
            .await;

        wrong.assert_status(StatusCode::UNAUTHORIZED);
        unknown.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.text(), "invalid credentials");
        assert_eq!(wrong.text(), unknown.text());
    }

    #[test_log::test(tokio::test)]
    async fn test_protected_routes_require_a_valid_token() {
        let server = create_test_server().await;

        let missing = server.get("/api/me").await;
        missing.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(missing.text(), "Authentication required");

        let garbage = server.get("/api/me").authorization_bearer("not-a-token").await;
        garbage.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(garbage.text(), missing.text());

        let wrong_scheme = server.get("/api/me").authorization("Basic dXNlcjpwYXNz").await;
        wrong_scheme.assert_status(StatusCode::UNAUTHORIZED);

        let foreign = crate::auth::token::TokenService::new("some-other-secret", std::time::Duration::from_secs(60))
            .issue(uuid::Uuid::new_v4())
            .unwrap();
        server
            .get("/api/users")
            .authorization_bearer(&foreign)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_token_for_deleted_user_is_rejected() {
        let app = crate::Application::new(create_test_config()).await.unwrap();
        let server = app.into_test_server();

        // Signed with the right secret, but for a user that does not exist
        let token = crate::auth::token::TokenService::new(TEST_SECRET, std::time::Duration::from_secs(60))
            .issue(uuid::Uuid::new_v4())
            .unwrap();
        server
            .get("/api/me")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_user_create_requires_permission() {
        let server = create_test_server().await;
        register(&server, "alice", "alice@example.com", "secret1").await;
        let alice = login_token(&server, "alice", "secret1").await;
        let admin = login_token(&server, "admin", "password").await;

        let new_user = json!({"username": "bob", "email": "bob@example.com", "password": "secret2", "role": "admin"});

        let denied = server.post("/api/users").authorization_bearer(&alice).json(&new_user).await;
        denied.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(denied.text(), "permission 'user:create' required");

        let created = server.post("/api/users").authorization_bearer(&admin).json(&new_user).await;
        created.assert_status(StatusCode::CREATED);
        let body: Value = created.json();
        assert_eq!(body["username"], "bob");
        assert_eq!(body["roles"][0]["name"], "admin");

        // Alice can read users but not create them
        let users: Vec<Value> = server.get("/api/users").authorization_bearer(&alice).await.json();
        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| u.get("password_hash").is_none()));
    }

    #[test_log::test(tokio::test)]
    async fn test_posts_gates() {
        let server = create_test_server().await;
        register(&server, "alice", "alice@example.com", "secret1").await;
        let alice = login_token(&server, "alice", "secret1").await;
        let admin = login_token(&server, "admin", "password").await;

        let posts: Vec<Value> = server.get("/api/posts").authorization_bearer(&alice).await.json();
        assert_eq!(posts[0]["title"], "Hello");

        let post = json!({"title": "Second", "content": "Another post"});
        server
            .post("/api/posts")
            .authorization_bearer(&alice)
            .json(&post)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let created = server.post("/api/posts").authorization_bearer(&admin).json(&post).await;
        created.assert_status(StatusCode::CREATED);
        assert_eq!(created.json::<Value>()["title"], "Second");

        let invalid = server
            .post("/api/posts")
            .authorization_bearer(&admin)
            .json(&json!({"title": "", "content": ""}))
            .await;
        invalid.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(invalid.json::<Value>()["errors"].as_array().unwrap().len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_registration_validation_and_conflicts() {
        let server = create_test_server().await;

        let invalid = server
            .post("/register")
            .json(&json!({"username": "", "email": "nope", "password": "123"}))
            .await;
        invalid.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = invalid.json();
        assert_eq!(body["errors"].as_array().unwrap().len(), 3);

        register(&server, "alice", "alice@example.com", "secret1").await;
        let duplicate = server
            .post("/register")
            .json(&json!({"username": "alice", "email": "other@example.com", "password": "secret1"}))
            .await;
        duplicate.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(duplicate.json::<Value>()["message"], "This username is already taken");
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_bodies_are_bad_requests() {
        let server = create_test_server().await;

        let register = server
            .post("/register")
            .json(&json!({"username": "alice", "email": "alice@example.com"}))
            .await;
        register.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = register.json();
        assert_eq!(body["message"], "Validation failed");
        assert_eq!(body["errors"][0]["field"], "password");

        let login = server.post("/login").json(&json!({"username": "admin"})).await;
        login.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(login.json::<Value>()["errors"][0]["field"], "password");

        let wrong_type = server
            .post("/login")
            .json(&json!({"username": "admin", "password": 42}))
            .await;
        wrong_type.assert_status(StatusCode::BAD_REQUEST);

        let admin = login_token(&server, "admin", "password").await;
        server
            .post("/api/posts")
            .authorization_bearer(&admin)
            .text("{not json")
            .content_type("application/json")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_registration_disabled() {
        let mut config = create_test_config();
        config.auth.allow_registration = false;
        let server = crate::Application::new(config).await.unwrap().into_test_server();

        server
            .post("/register")
            .json(&json!({"username": "alice", "email": "alice@example.com", "password": "secret1"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_route_under_api_is_not_found() {
        let server = create_test_server().await;

        server.get("/api/nope").expect_failure().await.assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_openapi_document_served() {
        let server = create_test_server().await;

        let doc: Value = server.get("/openapi.json").await.json();
        assert!(doc["paths"]["/api/users"].is_object());

        server.get("/docs").await.assert_status_ok();
    }
}
