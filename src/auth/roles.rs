//! Role-based capability checks shared by every protected operation.

use crate::{
    error::{ApiError, ApiResult},
    users::repo_types::{Role, User},
};

impl Role {
    /// Admin satisfies every requirement; a user only `User`.
    pub fn has_privilege(self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::User, Role::User) => true,
            (Role::User, Role::Admin) => false,
        }
    }
}

pub fn authorize(identity: &User, required: Role) -> ApiResult<()> {
    if identity.role.has_privilege(required) {
        Ok(())
    } else {
        tracing::warn!(user_id = %identity.id, ?required, "role check failed");
        Err(ApiError::forbidden("You do not have permission to perform this action"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn privilege_matrix() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::User));
        assert!(Role::User.has_privilege(Role::User));
        assert!(!Role::User.has_privilege(Role::Admin));
    }

    #[test]
    fn authorize_rejects_plain_users_for_admin_actions() {
        let mut user = testing::sample_user("alice", "a@x.com");
        assert!(authorize(&user, Role::User).is_ok());
        assert!(matches!(authorize(&user, Role::Admin), Err(ApiError::Forbidden(_))));

        user.role = Role::Admin;
        assert!(authorize(&user, Role::Admin).is_ok());
    }
}
