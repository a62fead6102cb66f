//! The authenticated caller and its permission set (spec §3 "User / Permission").
//!
//! The real auth database is an external collaborator (spec §1 Out of scope);
//! this module only fixes the contract a resolved token must satisfy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    TaskSubmit,
    TaskViewAll,
    TaskDeleteAll,
    QueueView,
    QueueManage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    /// Default permission grant per role. A real deployment may override
    /// this per-user; this is the fallback used by the development auth
    /// provider (`docforge-api::auth::SqliteAuthProvider`).
    pub fn default_permissions(&self) -> Vec<Permission> {
        match self {
            Role::Admin => vec![
                Permission::TaskSubmit,
                Permission::TaskViewAll,
                Permission::TaskDeleteAll,
                Permission::QueueView,
                Permission::QueueManage,
            ],
            Role::Manager => vec![
                Permission::TaskSubmit,
                Permission::TaskViewAll,
                Permission::QueueView,
            ],
            Role::User => vec![Permission::TaskSubmit],
        }
    }
}

/// The resolved identity of an API caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        let permissions = role.default_permissions();
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role,
            permissions,
        }
    }

    pub fn has_permission(&self, p: Permission) -> bool {
        self.permissions.contains(&p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_every_permission() {
        let p = Principal::new("u1", "alice", Role::Admin);
        assert!(p.has_permission(Permission::QueueManage));
        assert!(p.has_permission(Permission::TaskDeleteAll));
    }

    #[test]
    fn plain_user_cannot_view_all() {
        let p = Principal::new("u2", "bob", Role::User);
        assert!(p.has_permission(Permission::TaskSubmit));
        assert!(!p.has_permission(Permission::TaskViewAll));
    }
}
