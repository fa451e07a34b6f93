/// Per-request authentication context and authorization predicates
///
/// The JWT middleware builds an [`AuthContext`] from validated claims and
/// injects it into request extensions. Handlers that mutate admin-owned
/// resources call [`AuthContext::require_admin`] once, instead of comparing
/// role strings inline.

use uuid::Uuid;

use crate::models::UserRole;

/// Authorization errors
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The caller's role does not grant administrative access
    #[error("Admin access required")]
    AdminRequired,
}

/// Identity established for the current request
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    /// Authenticated user
    pub user_id: Uuid,

    /// Role carried by the access token
    pub role: UserRole,
}

impl AuthContext {
    /// Creates a context from validated token claims
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Admin capability check, applied in front of mutation operations
    pub fn require_admin(&self) -> Result<(), AuthzError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AuthzError::AdminRequired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_gate() {
        let admin = AuthContext::new(Uuid::new_v4(), UserRole::Admin);
        let user = AuthContext::new(Uuid::new_v4(), UserRole::User);

        assert!(admin.require_admin().is_ok());
        assert!(matches!(
            user.require_admin(),
            Err(AuthzError::AdminRequired)
        ));
    }
}
