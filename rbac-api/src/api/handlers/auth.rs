use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    api::handlers::JsonBody,
    api::models::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        users::UserResponse,
    },
    auth::accounts,
    errors::Result,
};

/// Register a new user account
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    tag = "authentication",
    summary = "Register",
    responses(
        (status = 201, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Invalid input, or username/email already taken"),
        (status = 403, description = "Registration is disabled"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = accounts::register(state.store.as_ref(), &state.config.auth, &request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    tag = "authentication",
    summary = "Login",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = accounts::login(state.store.as_ref(), &state.tokens, &state.decoy_digest, &request).await?;
    Ok(Json(response))
}
