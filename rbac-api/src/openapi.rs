//! OpenAPI documentation, served at `/openapi.json` and rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, errors};

/// Security scheme for routes under `/api` (Bearer token from `/login`).
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token returned by `POST /login`. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
    ),
    nest(
        (path = "/api", api = ProtectedApiDoc)
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::LoginResponse,
            api::models::users::UserResponse,
            api::models::users::RoleResponse,
            api::models::users::PermissionResponse,
            errors::FieldError,
        )
    ),
    tags(
        (name = "authentication", description = "Registration and login"),
        (name = "users", description = "Users and their roles"),
        (name = "posts", description = "Posts"),
    ),
    info(
        title = "rbac-api",
        description = "Bearer-token authentication with role-based permission checks",
    )
)]
pub struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::users::me,
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::posts::list_posts,
        api::handlers::posts::create_post,
    ),
    components(
        schemas(
            api::models::users::CurrentUser,
            api::models::users::UserCreate,
            api::models::posts::PostCreate,
            api::models::posts::PostResponse,
        )
    )
)]
struct ProtectedApiDoc;
