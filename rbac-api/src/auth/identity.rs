//! Bearer-token identity resolution.
//!
//! [`resolve_identity`] runs in front of every protected route. It validates the bearer token,
//! loads the user with roles and permissions from the store, and attaches the resulting
//! [`CurrentUser`] to the request extensions. Handlers then take `CurrentUser` as an extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{AuthFailure, Error, Result},
    types::abbrev_uuid,
};

/// Pull the token out of an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively; the token must be non-empty.
pub fn extract_bearer(headers: &HeaderMap) -> std::result::Result<&str, AuthFailure> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthFailure::MissingCredential)?;
    let value = value.to_str().map_err(|_| AuthFailure::MalformedCredential)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthFailure::MalformedCredential)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthFailure::MalformedCredential);
    }

    Ok(token)
}

/// Resolve the caller from the request headers.
#[instrument(skip_all)]
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser> {
    let token = extract_bearer(headers)?;

    let claims = state.tokens.validate(token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        Error::from(AuthFailure::InvalidToken)
    })?;

    let user = state
        .store
        .get_user_by_id(claims.sub)
        .await?
        .ok_or(Error::from(AuthFailure::UnknownUser))?;

    debug!(user_id = %abbrev_uuid(&user.id), "resolved identity");
    Ok(CurrentUser::from(user))
}

/// Middleware attaching the authenticated [`CurrentUser`] to the request, or rejecting it with a
/// 401.
pub async fn resolve_identity(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts.extensions.get::<CurrentUser>().cloned().ok_or(Error::Unauthenticated {
            reason: AuthFailure::NotAuthenticated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("bearer abc")), Ok("abc"));
        assert_eq!(extract_bearer(&headers("BEARER abc")), Ok("abc"));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(extract_bearer(&HeaderMap::new()), Err(AuthFailure::MissingCredential));
    }

    #[test]
    fn test_malformed_header() {
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwYXNz")), Err(AuthFailure::MalformedCredential));
        assert_eq!(extract_bearer(&headers("Bearer")), Err(AuthFailure::MalformedCredential));
        assert_eq!(extract_bearer(&headers("Bearer   ")), Err(AuthFailure::MalformedCredential));
        assert_eq!(extract_bearer(&headers("abc.def.ghi")), Err(AuthFailure::MalformedCredential));
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_is_server_error() {
        let request = axum::http::Request::builder().body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let err = CurrentUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
