//! Startup seeding of baseline permissions, roles and the bootstrap admin.
//!
//! Seeding is a reconciliation, not a one-shot insert: every run computes the desired state,
//! compares it with what the store holds and applies only the difference. Running it twice
//! leaves the store exactly as one run did.
//!
//! A failure on one record is logged and counted, and the routine moves on to the next.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{error, info, instrument, warn};

use crate::{
    auth::{accounts::hash_blocking, password::Argon2Params},
    config::SeedConfig,
    db::{
        CredentialStore,
        models::{
            permissions::{PermissionCreateDBRequest, PermissionDBResponse},
            roles::{RoleCreateDBRequest, RoleDBResponse},
            users::UserCreateDBRequest,
        },
    },
    types::PermissionId,
};

/// Permissions every deployment starts with: (name, description).
pub const BASELINE_PERMISSIONS: &[(&str, &str)] = &[
    ("user:read", "Read users"),
    ("user:create", "Create users"),
    ("post:create", "Create posts"),
    ("post:read", "Read posts"),
];

pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

/// Roles every deployment starts with: (name, description).
pub const BASELINE_ROLES: &[(&str, &str)] = &[(ADMIN_ROLE, "Administrator"), (USER_ROLE, "Regular user")];

/// What a seed run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub grants_added: u64,
    pub grants_removed: u64,
    pub admin_created: bool,
    pub admin_role_assigned: bool,
    /// Records that failed and were skipped
    pub failures: usize,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        *self
            == SeedReport {
                failures: self.failures,
                ..Default::default()
            }
    }
}

/// Permissions a role should hold: `admin` gets everything, `user` gets every `*:read`.
pub fn desired_grants(role_name: &str, permissions: &[PermissionDBResponse]) -> BTreeSet<PermissionId> {
    permissions
        .iter()
        .filter(|p| match role_name {
            ADMIN_ROLE => true,
            USER_ROLE => p.name.ends_with(":read"),
            _ => false,
        })
        .map(|p| p.id)
        .collect()
}

/// Edges to add and to remove to move `current` to `desired`.
pub fn grant_diff(desired: &BTreeSet<PermissionId>, current: &BTreeSet<PermissionId>) -> (Vec<PermissionId>, Vec<PermissionId>) {
    (
        desired.difference(current).copied().collect(),
        current.difference(desired).copied().collect(),
    )
}

async fn ensure_permissions(store: &dyn CredentialStore, report: &mut SeedReport) {
    for (name, description) in BASELINE_PERMISSIONS {
        match store.get_permission_by_name(name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let request = PermissionCreateDBRequest {
                    name: name.to_string(),
                    description: description.to_string(),
                };
                match store.create_permission(&request).await {
                    Ok(_) => report.permissions_created += 1,
                    // Someone else created it between the lookup and the insert
                    Err(e) if e.is_unique_violation_on("permissions") => {}
                    Err(e) => {
                        error!("Failed to create permission '{}': {}", name, e);
                        report.failures += 1;
                    }
                }
            }
            Err(e) => {
                error!("Failed to look up permission '{}': {}", name, e);
                report.failures += 1;
            }
        }
    }
}

async fn ensure_roles(store: &dyn CredentialStore, report: &mut SeedReport) -> BTreeMap<&'static str, RoleDBResponse> {
    let mut roles = BTreeMap::new();

    for (name, description) in BASELINE_ROLES {
        let existing = match store.get_role_by_name(name).await {
            Ok(existing) => existing,
            Err(e) => {
                error!("Failed to look up role '{}': {}", name, e);
                report.failures += 1;
                continue;
            }
        };

        let role = match existing {
            Some(role) => role,
            None => {
                let request = RoleCreateDBRequest {
                    name: name.to_string(),
                    description: description.to_string(),
                };
                match store.create_role(&request).await {
                    Ok(role) => {
                        report.roles_created += 1;
                        role
                    }
                    Err(e) => {
                        error!("Failed to create role '{}': {}", name, e);
                        report.failures += 1;
                        continue;
                    }
                }
            }
        };
        roles.insert(*name, role);
    }

    roles
}

async fn reconcile_grants(store: &dyn CredentialStore, roles: &BTreeMap<&'static str, RoleDBResponse>, report: &mut SeedReport) {
    let permissions = match store.list_permissions().await {
        Ok(permissions) => permissions,
        Err(e) => {
            error!("Failed to list permissions, skipping grant reconciliation: {}", e);
            report.failures += 1;
            return;
        }
    };

    for (name, role) in roles {
        let desired = desired_grants(name, &permissions);
        let current: BTreeSet<PermissionId> = role.permissions.iter().map(|p| p.id).collect();
        let (to_add, to_remove) = grant_diff(&desired, &current);

        match store.add_role_permissions(role.id, &to_add).await {
            Ok(added) => report.grants_added += added,
            Err(e) => {
                error!("Failed to grant permissions to role '{}': {}", name, e);
                report.failures += 1;
            }
        }

        match store.remove_role_permissions(role.id, &to_remove).await {
            Ok(removed) => report.grants_removed += removed,
            Err(e) => {
                error!("Failed to revoke permissions from role '{}': {}", name, e);
                report.failures += 1;
            }
        }
    }
}

async fn ensure_admin(
    store: &dyn CredentialStore,
    config: &SeedConfig,
    argon2: Argon2Params,
    admin_role: Option<&RoleDBResponse>,
    report: &mut SeedReport,
) {
    let existing = match store.get_user_by_username(&config.admin_username).await {
        Ok(existing) => existing,
        Err(e) => {
            error!("Failed to look up admin user '{}': {}", config.admin_username, e);
            report.failures += 1;
            return;
        }
    };

    let admin = match existing {
        Some(admin) => admin,
        None => {
            let password_hash = match hash_blocking(config.admin_password.clone(), argon2).await {
                Ok(hash) => hash,
                Err(e) => {
                    error!("Failed to hash admin password: {}", e);
                    report.failures += 1;
                    return;
                }
            };
            let request = UserCreateDBRequest {
                username: config.admin_username.clone(),
                email: config.admin_email.clone(),
                password_hash,
            };
            match store.create_user(&request).await {
                Ok(admin) => {
                    report.admin_created = true;
                    admin
                }
                Err(e) => {
                    error!("Failed to create admin user '{}': {}", config.admin_username, e);
                    report.failures += 1;
                    return;
                }
            }
        }
    };

    let Some(admin_role) = admin_role else {
        warn!("Role '{}' is unavailable, admin user left without it", ADMIN_ROLE);
        return;
    };

    if admin.roles.iter().any(|r| r.id == admin_role.id) {
        return;
    }

    match store.add_user_roles(admin.id, &[admin_role.id]).await {
        Ok(added) => report.admin_role_assigned = added > 0,
        Err(e) => {
            error!("Failed to assign role '{}' to admin user: {}", ADMIN_ROLE, e);
            report.failures += 1;
        }
    }
}

/// Bring the store up to the baseline. Safe to run on every startup.
#[instrument(skip_all, fields(admin = %config.admin_username))]
pub async fn run(store: &dyn CredentialStore, config: &SeedConfig, argon2: Argon2Params) -> SeedReport {
    let mut report = SeedReport::default();

    ensure_permissions(store, &mut report).await;
    let roles = ensure_roles(store, &mut report).await;
    reconcile_grants(store, &roles, &mut report).await;
    ensure_admin(store, config, argon2, roles.get(ADMIN_ROLE), &mut report).await;

    if report.is_noop() {
        info!("Seed data already up to date");
    } else {
        info!(?report, "Seed data reconciled");
    }
    if report.failures > 0 {
        warn!("{} seed record(s) failed and were skipped", report.failures);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryCredentialStore;
    use crate::test_utils::fast_argon2;
    use chrono::Utc;
    use uuid::Uuid;

    fn permission(name: &str) -> PermissionDBResponse {
        PermissionDBResponse {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_desired_grants() {
        let permissions: Vec<_> = ["user:read", "user:create", "post:read"].into_iter().map(permission).collect();

        assert_eq!(desired_grants(ADMIN_ROLE, &permissions).len(), 3);
        let user = desired_grants(USER_ROLE, &permissions);
        assert_eq!(user.len(), 2);
        assert!(!user.contains(&permissions[1].id));
        assert!(desired_grants("auditor", &permissions).is_empty());
    }

    #[test]
    fn test_grant_diff() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let desired = BTreeSet::from([a, b]);
        let current = BTreeSet::from([b, c]);

        assert_eq!(grant_diff(&desired, &current), (vec![a], vec![c]));
        assert_eq!(grant_diff(&desired, &desired), (vec![], vec![]));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryCredentialStore::new();
        let config = SeedConfig::default();

        let first = run(&store, &config, fast_argon2()).await;
        assert_eq!(first.permissions_created, 4);
        assert_eq!(first.roles_created, 2);
        assert!(first.admin_created);
        assert_eq!(first.failures, 0);

        let second = run(&store, &config, fast_argon2()).await;
        assert!(second.is_noop());
        assert_eq!(second.failures, 0);

        let admin_role = store.get_role_by_name(ADMIN_ROLE).await.unwrap().unwrap();
        let mut admin_permissions: Vec<_> = admin_role.permissions.iter().map(|p| p.name.as_str()).collect();
        admin_permissions.sort();
        assert_eq!(admin_permissions, vec!["post:create", "post:read", "user:create", "user:read"]);

        let user_role = store.get_role_by_name(USER_ROLE).await.unwrap().unwrap();
        let user_permissions: Vec<_> = user_role.permissions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(user_permissions, vec!["post:read", "user:read"]);

        let users = store.list_users().await.unwrap();
        let admins: Vec<_> = users.iter().filter(|u| u.username == "admin").collect();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].roles.len(), 1);
        assert_eq!(admins[0].roles[0].name, ADMIN_ROLE);
    }

    #[tokio::test]
    async fn test_seed_repairs_drifted_grants() {
        let store = InMemoryCredentialStore::new();
        let config = SeedConfig::default();
        run(&store, &config, fast_argon2()).await;

        // Hand the user role a write permission and strip one of its reads
        let user_role = store.get_role_by_name(USER_ROLE).await.unwrap().unwrap();
        let create = store.get_permission_by_name("user:create").await.unwrap().unwrap();
        let read = store.get_permission_by_name("post:read").await.unwrap().unwrap();
        store.add_role_permissions(user_role.id, &[create.id]).await.unwrap();
        store.remove_role_permissions(user_role.id, &[read.id]).await.unwrap();

        let report = run(&store, &config, fast_argon2()).await;
        assert_eq!(report.grants_added, 1);
        assert_eq!(report.grants_removed, 1);

        let user_role = store.get_role_by_name(USER_ROLE).await.unwrap().unwrap();
        let names: Vec<_> = user_role.permissions.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["post:read", "user:read"]);
    }

    #[tokio::test]
    async fn test_existing_admin_gets_admin_role() {
        let store = InMemoryCredentialStore::new();
        store
            .create_user(&UserCreateDBRequest {
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let report = run(&store, &SeedConfig::default(), fast_argon2()).await;
        assert!(!report.admin_created);
        assert!(report.admin_role_assigned);

        let admin = store.get_user_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.roles[0].name, ADMIN_ROLE);
    }

    #[tokio::test]
    async fn test_failed_record_is_skipped() {
        let store = InMemoryCredentialStore::new();
        // Holds the admin's email under another name, so the admin insert hits users_email_key
        store
            .create_user(&UserCreateDBRequest {
                username: "squatter".to_string(),
                email: "admin@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let report = run(&store, &SeedConfig::default(), fast_argon2()).await;

        assert_eq!(report.failures, 1);
        assert!(!report.admin_created);
        assert_eq!(report.permissions_created, 4);
        assert_eq!(report.roles_created, 2);
        assert_eq!(report.grants_added, 6);

        assert!(store.get_user_by_username("admin").await.unwrap().is_none());
        let admin_role = store.get_role_by_name(ADMIN_ROLE).await.unwrap().unwrap();
        assert_eq!(admin_role.permissions.len(), 4);
        let squatter = store.get_user_by_username("squatter").await.unwrap().unwrap();
        assert!(squatter.roles.is_empty());
    }
}
