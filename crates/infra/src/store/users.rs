use tracing::instrument;

use rolegate_auth::UserRepository;
use rolegate_core::{AccessResult, PermissionId, RoleId, UserId};

use super::pivot::{distinct, USER_PERMISSIONS, USER_ROLES};
use super::SqlRbacStore;

fn role_ids(ids: &[RoleId]) -> Vec<i64> {
    distinct(ids.iter().map(|id| id.to_i64()))
}

fn permission_ids(ids: &[PermissionId]) -> Vec<i64> {
    distinct(ids.iter().map(|id| id.to_i64()))
}

#[async_trait::async_trait]
impl UserRepository for SqlRbacStore {
    #[instrument(skip(self, roles), fields(user = %user, count = roles.len()), err)]
    async fn add_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()> {
        self.add_pairs(USER_ROLES, "users.add_roles", user.to_i64(), &role_ids(roles))
            .await
    }

    #[instrument(skip(self, roles), fields(user = %user, count = roles.len()), err)]
    async fn replace_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()> {
        self.replace_pairs(USER_ROLES, "users.replace_roles", user.to_i64(), &role_ids(roles))
            .await
    }

    #[instrument(skip(self, roles), fields(user = %user, count = roles.len()), err)]
    async fn remove_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()> {
        self.remove_pairs(USER_ROLES, "users.remove_roles", user.to_i64(), &role_ids(roles))
            .await
    }

    #[instrument(skip(self), fields(user = %user), err)]
    async fn clear_roles(&self, user: UserId) -> AccessResult<()> {
        self.clear_pairs(USER_ROLES, "users.clear_roles", user.to_i64()).await
    }

    #[instrument(skip(self, permissions), fields(user = %user, count = permissions.len()), err)]
    async fn add_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()> {
        self.add_pairs(
            USER_PERMISSIONS,
            "users.add_permissions",
            user.to_i64(),
            &permission_ids(permissions),
        )
        .await
    }

    #[instrument(skip(self, permissions), fields(user = %user, count = permissions.len()), err)]
    async fn replace_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()> {
        self.replace_pairs(
            USER_PERMISSIONS,
            "users.replace_permissions",
            user.to_i64(),
            &permission_ids(permissions),
        )
        .await
    }

    #[instrument(skip(self, permissions), fields(user = %user, count = permissions.len()), err)]
    async fn remove_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()> {
        self.remove_pairs(
            USER_PERMISSIONS,
            "users.remove_permissions",
            user.to_i64(),
            &permission_ids(permissions),
        )
        .await
    }

    #[instrument(skip(self), fields(user = %user), err)]
    async fn clear_permissions(&self, user: UserId) -> AccessResult<()> {
        self.clear_pairs(USER_PERMISSIONS, "users.clear_permissions", user.to_i64())
            .await
    }

    #[instrument(skip(self), fields(user = %user, role_id = %role), err)]
    async fn has_role(&self, user: UserId, role: RoleId) -> AccessResult<bool> {
        let n = self
            .count_pairs(USER_ROLES, "users.has_role", &[user.to_i64()], &[role.to_i64()])
            .await?;
        Ok(n > 0)
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    async fn has_all_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<bool> {
        let roles = role_ids(roles);
        let n = self
            .count_pairs(USER_ROLES, "users.has_all_roles", &[user.to_i64()], &roles)
            .await?;
        Ok(n == roles.len() as u64)
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    async fn has_any_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<bool> {
        let n = self
            .count_pairs(USER_ROLES, "users.has_any_roles", &[user.to_i64()], &role_ids(roles))
            .await?;
        Ok(n > 0)
    }

    #[instrument(skip(self), fields(user = %user, permission_id = %permission), err)]
    async fn has_direct_permission(&self, user: UserId, permission: PermissionId) -> AccessResult<bool> {
        let n = self
            .count_pairs(
                USER_PERMISSIONS,
                "users.has_direct_permission",
                &[user.to_i64()],
                &[permission.to_i64()],
            )
            .await?;
        Ok(n > 0)
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    async fn has_all_direct_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<bool> {
        let permissions = permission_ids(permissions);
        let n = self
            .count_pairs(
                USER_PERMISSIONS,
                "users.has_all_direct_permissions",
                &[user.to_i64()],
                &permissions,
            )
            .await?;
        Ok(n == permissions.len() as u64)
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    async fn has_any_direct_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<bool> {
        let n = self
            .count_pairs(
                USER_PERMISSIONS,
                "users.has_any_direct_permissions",
                &[user.to_i64()],
                &permission_ids(permissions),
            )
            .await?;
        Ok(n > 0)
    }
}
