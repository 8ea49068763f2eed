//! Acting-user context.
//!
//! The engine never consults ambient session state; the acting user is an
//! explicit parameter threaded through every call. Identity resolution is
//! a collaborator concern — this context carries only what the engine
//! needs to authorize.

use uuid::Uuid;

use super::permission::{PermissionCode, PermissionSet};

/// User context for one request.
#[derive(Debug, Clone)]
pub struct UserContext {
    /// User id (Uuid::nil() for anonymous).
    pub id: Uuid,

    /// Admin users bypass permission checks.
    pub admin: bool,

    /// Default permission codes from the user's groups, applied wherever
    /// no explicit node assignment exists.
    pub default_permissions: PermissionSet,

    /// Whether the user's start nodes grant access to the tree root.
    pub root_access: bool,

    /// Whether the user may operate inside the recycle bin.
    pub bin_access: bool,
}

impl UserContext {
    /// Context for an admin user.
    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            admin: true,
            default_permissions: PermissionSet::new(),
            root_access: true,
            bin_access: true,
        }
    }

    /// Context for an editor with the given group default codes.
    pub fn editor(id: Uuid, default_permissions: PermissionSet) -> Self {
        Self {
            id,
            admin: false,
            default_permissions,
            root_access: true,
            bin_access: false,
        }
    }

    /// Whether the user's defaults include a code.
    pub fn has_default(&self, code: PermissionCode) -> bool {
        self.default_permissions.contains(code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn admin_context() {
        let user = UserContext::admin(Uuid::now_v7());
        assert!(user.admin);
        assert!(user.root_access);
        assert!(user.bin_access);
    }

    #[test]
    fn editor_context() {
        let user = UserContext::editor(Uuid::now_v7(), PermissionSet::from_letters("RU"));
        assert!(!user.admin);
        assert!(user.has_default(PermissionCode::Read));
        assert!(!user.has_default(PermissionCode::Publish));
        assert!(!user.bin_access);
    }
}
