use axum::{Json, http::StatusCode};
use axum_extra::extract::WithRejection;

use crate::{
    api::handlers::JsonBody,
    api::models::{
        posts::{PostCreate, PostResponse},
        users::CurrentUser,
    },
    errors::{Error, FieldError, Result},
};

/// List posts
#[utoipa::path(
    get,
    path = "/posts",
    tag = "posts",
    summary = "List posts",
    responses(
        (status = 200, description = "Posts", body = Vec<PostResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires post:read")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_posts() -> Json<Vec<PostResponse>> {
    Json(vec![PostResponse {
        id: 1,
        title: "Hello".to_string(),
        content: "First post".to_string(),
    }])
}

/// Create a post
#[utoipa::path(
    post,
    path = "/posts",
    tag = "posts",
    summary = "Create post",
    request_body = PostCreate,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Missing title or content"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires post:create")
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all, fields(author = %current_user.username))]
pub async fn create_post(
    current_user: CurrentUser,
    WithRejection(Json(create), _): JsonBody<PostCreate>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    let mut errors = Vec::new();
    if create.title.trim().is_empty() {
        errors.push(FieldError::new("title", "title is required"));
    }
    if create.content.trim().is_empty() {
        errors.push(FieldError::new("content", "content is required"));
    }
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: 2,
            title: create.title,
            content: create.content,
        }),
    ))
}
