//! Shared helpers for tests.

use axum_test::TestServer;
use serde_json::json;

use crate::{
    Application,
    auth::password::Argon2Params,
    config::{AuthConfig, Config, DatabaseConfig, PasswordConfig},
};

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

/// Argon2 parameters cheap enough for tests.
pub fn fast_argon2() -> Argon2Params {
    Argon2Params {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn fast_auth_config() -> AuthConfig {
    let argon2 = fast_argon2();
    AuthConfig {
        password: PasswordConfig {
            argon2_memory_kib: argon2.memory_kib,
            argon2_iterations: argon2.iterations,
            argon2_parallelism: argon2.parallelism,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// In-memory store, seeding on, admin password `password`.
pub fn create_test_config() -> Config {
    Config {
        database: DatabaseConfig::Memory,
        secret_key: Some(TEST_SECRET.to_string()),
        auth: fast_auth_config(),
        ..Default::default()
    }
}

pub async fn create_test_server() -> TestServer {
    Application::new(create_test_config())
        .await
        .expect("Failed to create application")
        .into_test_server()
}

pub async fn register(server: &TestServer, username: &str, email: &str, password: &str) {
    server
        .post("/register")
        .json(&json!({"username": username, "email": email, "password": password}))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
}

pub async fn login_token(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/login")
        .json(&json!({"username": username, "password": password}))
        .await;
    response.assert_status_ok();

    response.json::<serde_json::Value>()["token"]
        .as_str()
        .expect("login response without token")
        .to_string()
}
