use std::collections::HashMap;

use sqlx::{FromRow, QueryBuilder, Row, Sqlite};
use tracing::{debug, instrument};

use rolegate_auth::{Changes, NewRole, Permission, Role, RoleRepository};
use rolegate_core::{AccessError, AccessResult, GuardName, IdPage, Pagination, PermissionId, RoleId, UserId};

use super::entity::{EntityRow, NewEntity, ROLES};
use super::pivot::{distinct, IN_LIST_CHUNK, ROLE_PERMISSIONS, USER_ROLES};
use super::SqlRbacStore;
use crate::error::{finish, map_sqlx_error};

fn role_ids(ids: &[RoleId]) -> Vec<i64> {
    distinct(ids.iter().map(|id| id.to_i64()))
}

fn permission_ids(ids: &[PermissionId]) -> Vec<i64> {
    distinct(ids.iter().map(|id| id.to_i64()))
}

#[async_trait::async_trait]
impl RoleRepository for SqlRbacStore {
    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn get_by_id(&self, id: RoleId) -> AccessResult<Option<Role>> {
        let row = ROLES
            .by_id(&self.pool, id.to_i64())
            .await
            .map_err(|e| map_sqlx_error("roles.get_by_id", e))?;
        Ok(row.map(Role::from))
    }

    #[instrument(skip(self), fields(guard_name = %guard_name), err)]
    async fn get_by_guard_name(&self, guard_name: &GuardName) -> AccessResult<Option<Role>> {
        let row = ROLES
            .by_guard_name(&self.pool, guard_name)
            .await
            .map_err(|e| map_sqlx_error("roles.get_by_guard_name", e))?;
        Ok(row.map(Role::from))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_many(&self, ids: &[RoleId]) -> AccessResult<Vec<Role>> {
        let rows = ROLES
            .many_by_ids(&self.pool, &role_ids(ids))
            .await
            .map_err(|e| map_sqlx_error("roles.get_many", e))?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self, guard_names), fields(count = guard_names.len()), err)]
    async fn get_many_by_guard_names(&self, guard_names: &[GuardName]) -> AccessResult<Vec<Role>> {
        let rows = ROLES
            .many_by_guard_names(&self.pool, guard_names)
            .await
            .map_err(|e| map_sqlx_error("roles.get_many_by_guard_names", e))?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn get_ids(&self, pagination: Option<Pagination>) -> AccessResult<IdPage<RoleId>> {
        let (ids, total) = ROLES
            .ids(&self.pool, pagination)
            .await
            .map_err(|e| map_sqlx_error("roles.get_ids", e))?;
        Ok(IdPage::new(ids.into_iter().map(RoleId::from_i64).collect(), total))
    }

    #[instrument(skip(self), fields(user = %user), err)]
    async fn role_ids_of_user(&self, user: UserId, pagination: Option<Pagination>) -> AccessResult<IdPage<RoleId>> {
        self.related_page(USER_ROLES, "roles.role_ids_of_user", &[user.to_i64()], pagination)
            .await
    }

    #[instrument(skip(self), fields(permission_id = %permission), err)]
    async fn role_ids_of_permission(
        &self,
        permission: PermissionId,
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<RoleId>> {
        const OPERATION: &str = "roles.role_ids_of_permission";
        let mut conn = self.acquire(OPERATION).await?;
        let (ids, total) = ROLE_PERMISSIONS
            .owners_of(&mut conn, permission.to_i64(), pagination)
            .await
            .map_err(|e| map_sqlx_error(OPERATION, e))?;
        Ok(IdPage::new(ids.into_iter().map(RoleId::from_i64).collect(), total))
    }

    #[instrument(skip(self, roles), fields(roles = roles.len()), err)]
    async fn permission_ids_of_roles(
        &self,
        roles: &[RoleId],
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<PermissionId>> {
        self.related_page(
            ROLE_PERMISSIONS,
            "roles.permission_ids_of_roles",
            &role_ids(roles),
            pagination,
        )
        .await
    }

    /// One join for all roles; permissions come back ordered by id.
    #[instrument(skip(self, roles), fields(roles = roles.len()), err)]
    async fn load_permissions(&self, mut roles: Vec<Role>) -> AccessResult<Vec<Role>> {
        const OPERATION: &str = "roles.load_permissions";
        if roles.is_empty() {
            return Ok(roles);
        }

        let mut by_role: HashMap<i64, Vec<Permission>> = HashMap::new();
        for chunk in distinct(roles.iter().map(|r| r.id.to_i64())).chunks(IN_LIST_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT rp.role_id AS owner_id, p.id, p.name, p.guard_name, p.description, p.created_at, p.updated_at \
                 FROM role_permissions rp JOIN permissions p ON p.id = rp.permission_id WHERE rp.role_id IN (",
            );
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(") ORDER BY p.id");

            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(OPERATION, e))?;

            for row in &rows {
                let owner: i64 = row.try_get("owner_id").map_err(|e| map_sqlx_error(OPERATION, e))?;
                let permission = EntityRow::from_row(row).map_err(|e| map_sqlx_error(OPERATION, e))?;
                by_role.entry(owner).or_default().push(permission.into());
            }
        }

        for role in &mut roles {
            role.permissions = by_role.get(&role.id.to_i64()).cloned().unwrap_or_default();
        }
        Ok(roles)
    }

    #[instrument(skip(self, new), fields(guard_name = %new.guard_name), err)]
    async fn find_or_create(&self, new: NewRole) -> AccessResult<Role> {
        let row = ROLES
            .find_or_create(&self.pool, NewEntity::from(&new))
            .await
            .map_err(|e| map_sqlx_error("roles.find_or_create", e))?;
        Ok(row.into())
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn update(&self, id: RoleId, changes: Changes) -> AccessResult<Role> {
        let row = ROLES
            .update(&self.pool, id.to_i64(), &changes)
            .await
            .map_err(|e| map_sqlx_error("roles.update", e))?;
        row.map(Role::from).ok_or_else(|| AccessError::not_found("role", id))
    }

    /// Pivot rows first, then the role, in one transaction.
    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete(&self, id: RoleId) -> AccessResult<()> {
        const OPERATION: &str = "roles.delete";
        let id = id.to_i64();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(OPERATION, e))?;

        let outcome = async {
            let permission_links = ROLE_PERMISSIONS.delete_owner(&mut tx, id).await?;
            let user_links = USER_ROLES.delete_related(&mut tx, id).await?;
            ROLES.delete(&mut tx, id).await?;
            Ok::<_, sqlx::Error>((permission_links, user_links))
        }
        .await;

        let (permission_links, user_links) = finish(tx, OPERATION, outcome).await?;
        debug!(permission_links, user_links, "role deleted");
        Ok(())
    }

    #[instrument(skip(self, permissions), fields(role_id = %role, count = permissions.len()), err)]
    async fn add_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()> {
        self.add_pairs(
            ROLE_PERMISSIONS,
            "roles.add_permissions",
            role.to_i64(),
            &permission_ids(permissions),
        )
        .await
    }

    #[instrument(skip(self, permissions), fields(role_id = %role, count = permissions.len()), err)]
    async fn replace_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()> {
        self.replace_pairs(
            ROLE_PERMISSIONS,
            "roles.replace_permissions",
            role.to_i64(),
            &permission_ids(permissions),
        )
        .await
    }

    #[instrument(skip(self, permissions), fields(role_id = %role, count = permissions.len()), err)]
    async fn remove_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()> {
        self.remove_pairs(
            ROLE_PERMISSIONS,
            "roles.remove_permissions",
            role.to_i64(),
            &permission_ids(permissions),
        )
        .await
    }

    #[instrument(skip(self), fields(role_id = %role), err)]
    async fn clear_permissions(&self, role: RoleId) -> AccessResult<()> {
        self.clear_pairs(ROLE_PERMISSIONS, "roles.clear_permissions", role.to_i64())
            .await
    }

    #[instrument(skip(self, roles), fields(roles = roles.len(), permission_id = %permission), err)]
    async fn has_permission(&self, roles: &[RoleId], permission: PermissionId) -> AccessResult<bool> {
        let n = self
            .count_pairs(
                ROLE_PERMISSIONS,
                "roles.has_permission",
                &role_ids(roles),
                &[permission.to_i64()],
            )
            .await?;
        Ok(n > 0)
    }

    /// Holds only under pivot uniqueness: `count == |roles| × |permissions|`.
    #[instrument(skip(self, roles, permissions), err)]
    async fn has_all_permissions(&self, roles: &[RoleId], permissions: &[PermissionId]) -> AccessResult<bool> {
        let roles = role_ids(roles);
        let permissions = permission_ids(permissions);
        let n = self
            .count_pairs(ROLE_PERMISSIONS, "roles.has_all_permissions", &roles, &permissions)
            .await?;
        Ok(n == (roles.len() * permissions.len()) as u64)
    }

    #[instrument(skip(self, roles, permissions), err)]
    async fn has_any_permissions(&self, roles: &[RoleId], permissions: &[PermissionId]) -> AccessResult<bool> {
        let n = self
            .count_pairs(
                ROLE_PERMISSIONS,
                "roles.has_any_permissions",
                &role_ids(roles),
                &permission_ids(permissions),
            )
            .await?;
        Ok(n > 0)
    }
}
