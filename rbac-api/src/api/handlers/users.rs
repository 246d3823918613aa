use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;

use crate::{
    AppState,
    api::handlers::JsonBody,
    api::models::users::{CurrentUser, UserCreate, UserResponse},
    auth::accounts::{self, NewAccount},
    errors::Result,
    types::abbrev_uuid,
};

/// Get the authenticated user
#[utoipa::path(
    get,
    path = "/me",
    tag = "users",
    summary = "Current user",
    responses(
        (status = 200, description = "The authenticated user with roles and effective permissions", body = CurrentUser),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(current_user: CurrentUser) -> Json<CurrentUser> {
    Json(current_user)
}

/// List all users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    responses(
        (status = 200, description = "All users with roles and permissions", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires user:read"),
        (status = 500, description = "Internal server error")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Create a user, optionally attaching a role
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input, or username/email already taken"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires user:create"),
        (status = 500, description = "Internal server error")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(created_by = %current_user.username))]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    WithRejection(Json(create), _): JsonBody<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let account = NewAccount {
        username: &create.username,
        email: &create.email,
        password: &create.password,
    };
    let role = create.role.as_deref().filter(|r| !r.is_empty());

    let (user, outcome) = accounts::create_account(state.store.as_ref(), &state.config.auth.password, account, role).await?;

    tracing::info!(user_id = %abbrev_uuid(&user.id), role = ?outcome, "user created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}
