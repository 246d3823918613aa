//! Account registration and credential login.
//!
//! Both flows hash or verify on a blocking thread, since Argon2 is deliberately slow.

use tracing::{debug, info, instrument, warn};

use crate::{
    api::models::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        users::UserResponse,
    },
    auth::{
        password::{self, Argon2Params},
        token::TokenService,
    },
    config::{AuthConfig, PasswordConfig},
    db::{
        CredentialStore,
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    errors::{AuthFailure, Error, FieldError, Result},
    types::{UserId, abbrev_uuid},
};

/// Result of attaching a named role to a freshly created account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultRoleOutcome {
    Assigned,
    /// No role with that name exists; the account is left without it
    RoleAbsent,
}

/// Input for creating an account, shared by self-registration and admin creation.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Syntactic email check: one `@`, a non-empty local part and a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Check every field and report all offending ones together.
pub fn validate_account(account: &NewAccount<'_>, rules: &PasswordConfig) -> Result<()> {
    let mut errors = Vec::new();

    if account.username.trim().is_empty() {
        errors.push(FieldError::new("username", "username is required"));
    }

    if account.email.trim().is_empty() {
        errors.push(FieldError::new("email", "email is required"));
    } else if !is_valid_email(account.email) {
        errors.push(FieldError::new("email", "email is not a valid address"));
    }

    let length = account.password.chars().count();
    if length < rules.min_length {
        errors.push(FieldError::new(
            "password",
            format!("password must be at least {} characters", rules.min_length),
        ));
    } else if length > rules.max_length {
        errors.push(FieldError::new(
            "password",
            format!("password must be no more than {} characters", rules.max_length),
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(Error::Validation { errors }) }
}

pub(crate) async fn hash_blocking(password: String, params: Argon2Params) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

async fn verify_blocking(password: String, digest: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &digest))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })
}

/// Hash a throwaway password with `params`.
///
/// Logins naming an unknown user verify against this digest, so they pay the same Argon2 cost as
/// a wrong password for a real account.
pub async fn decoy_digest(params: Argon2Params) -> Result<String> {
    hash_blocking("rbac-api-decoy-password".to_string(), params).await
}

/// Attach the named role to a user if the role exists.
///
/// A missing role is a normal outcome; store failures are errors.
#[instrument(skip(store), fields(user_id = %abbrev_uuid(&user_id)))]
pub async fn assign_role_if_present(store: &dyn CredentialStore, user_id: UserId, role_name: &str) -> Result<DefaultRoleOutcome> {
    match store.get_role_by_name(role_name).await? {
        Some(role) => {
            store.add_user_roles(user_id, &[role.id]).await?;
            Ok(DefaultRoleOutcome::Assigned)
        }
        None => {
            warn!("Role '{}' does not exist, account created without it", role_name);
            Ok(DefaultRoleOutcome::RoleAbsent)
        }
    }
}

/// Validate, hash and store a new account, then attach `role` when given.
///
/// Returns the stored user reloaded with its role graph.
pub async fn create_account(
    store: &dyn CredentialStore,
    rules: &PasswordConfig,
    account: NewAccount<'_>,
    role: Option<&str>,
) -> Result<(UserDBResponse, Option<DefaultRoleOutcome>)> {
    validate_account(&account, rules)?;

    let password_hash = hash_blocking(account.password.to_string(), rules.argon2_params()).await?;

    let created = store
        .create_user(&UserCreateDBRequest {
            username: account.username.to_string(),
            email: account.email.to_string(),
            password_hash,
        })
        .await
        .map_err(Error::conflict_from)?;

    let outcome = match role {
        Some(role) => Some(assign_role_if_present(store, created.id, role).await?),
        None => None,
    };

    let user = store.get_user_by_id(created.id).await?.unwrap_or(created);
    Ok((user, outcome))
}

/// Self-registration.
#[instrument(skip_all, fields(username = %request.username))]
pub async fn register(store: &dyn CredentialStore, config: &AuthConfig, request: &RegisterRequest) -> Result<UserResponse> {
    if !config.allow_registration {
        return Err(Error::RegistrationDisabled);
    }

    let account = NewAccount {
        username: &request.username,
        email: &request.email,
        password: &request.password,
    };
    let (user, outcome) = create_account(store, &config.password, account, Some(&config.default_role)).await?;

    info!(user_id = %abbrev_uuid(&user.id), default_role = ?outcome, "registered user");
    Ok(UserResponse::from(user))
}

/// Exchange a username and password for a bearer token.
///
/// Unknown usernames and wrong passwords fail identically, and both pay for one verification:
/// unknown users are checked against `decoy_digest`.
#[instrument(skip_all, fields(username = %request.username))]
pub async fn login(
    store: &dyn CredentialStore,
    tokens: &TokenService,
    decoy_digest: &str,
    request: &LoginRequest,
) -> Result<LoginResponse> {
    let user = store.get_user_by_username(&request.username).await?;

    let digest = match &user {
        Some(user) => user.password_hash.clone(),
        None => decoy_digest.to_string(),
    };
    let verified = verify_blocking(request.password.clone(), digest).await?;

    let user = match user {
        Some(user) if verified => user,
        Some(_) => {
            debug!("password mismatch");
            return Err(AuthFailure::InvalidCredentials.into());
        }
        None => {
            debug!("unknown username");
            return Err(AuthFailure::InvalidCredentials.into());
        }
    };

    let token = tokens.issue(user.id).map_err(|e| Error::Internal {
        operation: format!("issue token: {e}"),
    })?;

    info!(user_id = %abbrev_uuid(&user.id), "login succeeded");
    Ok(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: tokens.ttl().as_secs(),
    })
}
