use tracing::{debug, instrument};

use rolegate_auth::{Changes, NewPermission, Permission, PermissionRepository};
use rolegate_core::{AccessError, AccessResult, GuardName, IdPage, Pagination, PermissionId, UserId};

use super::entity::{NewEntity, PERMISSIONS};
use super::pivot::{distinct, ROLE_PERMISSIONS, USER_PERMISSIONS};
use super::SqlRbacStore;
use crate::error::{finish, map_sqlx_error};

#[async_trait::async_trait]
impl PermissionRepository for SqlRbacStore {
    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn get_by_id(&self, id: PermissionId) -> AccessResult<Option<Permission>> {
        let row = PERMISSIONS
            .by_id(&self.pool, id.to_i64())
            .await
            .map_err(|e| map_sqlx_error("permissions.get_by_id", e))?;
        Ok(row.map(Permission::from))
    }

    #[instrument(skip(self), fields(guard_name = %guard_name), err)]
    async fn get_by_guard_name(&self, guard_name: &GuardName) -> AccessResult<Option<Permission>> {
        let row = PERMISSIONS
            .by_guard_name(&self.pool, guard_name)
            .await
            .map_err(|e| map_sqlx_error("permissions.get_by_guard_name", e))?;
        Ok(row.map(Permission::from))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_many(&self, ids: &[PermissionId]) -> AccessResult<Vec<Permission>> {
        let ids = distinct(ids.iter().map(|id| id.to_i64()));
        let rows = PERMISSIONS
            .many_by_ids(&self.pool, &ids)
            .await
            .map_err(|e| map_sqlx_error("permissions.get_many", e))?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    #[instrument(skip(self, guard_names), fields(count = guard_names.len()), err)]
    async fn get_many_by_guard_names(&self, guard_names: &[GuardName]) -> AccessResult<Vec<Permission>> {
        let rows = PERMISSIONS
            .many_by_guard_names(&self.pool, guard_names)
            .await
            .map_err(|e| map_sqlx_error("permissions.get_many_by_guard_names", e))?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    #[instrument(skip(self), err)]
    async fn get_ids(&self, pagination: Option<Pagination>) -> AccessResult<IdPage<PermissionId>> {
        let (ids, total) = PERMISSIONS
            .ids(&self.pool, pagination)
            .await
            .map_err(|e| map_sqlx_error("permissions.get_ids", e))?;
        Ok(IdPage::new(ids.into_iter().map(PermissionId::from_i64).collect(), total))
    }

    #[instrument(skip(self), fields(user = %user), err)]
    async fn direct_permission_ids_of_user(
        &self,
        user: UserId,
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<PermissionId>> {
        self.related_page(
            USER_PERMISSIONS,
            "permissions.direct_permission_ids_of_user",
            &[user.to_i64()],
            pagination,
        )
        .await
    }

    #[instrument(skip(self, new), fields(guard_name = %new.guard_name), err)]
    async fn find_or_create(&self, new: NewPermission) -> AccessResult<Permission> {
        let row = PERMISSIONS
            .find_or_create(&self.pool, NewEntity::from(&new))
            .await
            .map_err(|e| map_sqlx_error("permissions.find_or_create", e))?;
        Ok(row.into())
    }

    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn update(&self, id: PermissionId, changes: Changes) -> AccessResult<Permission> {
        let row = PERMISSIONS
            .update(&self.pool, id.to_i64(), &changes)
            .await
            .map_err(|e| map_sqlx_error("permissions.update", e))?;
        row.map(Permission::from)
            .ok_or_else(|| AccessError::not_found("permission", id))
    }

    /// Pivot rows first, then the permission, in one transaction.
    #[instrument(skip(self), fields(permission_id = %id), err)]
    async fn delete(&self, id: PermissionId) -> AccessResult<()> {
        const OPERATION: &str = "permissions.delete";
        let id = id.to_i64();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(OPERATION, e))?;

        let outcome = async {
            let role_links = ROLE_PERMISSIONS.delete_related(&mut tx, id).await?;
            let user_links = USER_PERMISSIONS.delete_related(&mut tx, id).await?;
            PERMISSIONS.delete(&mut tx, id).await?;
            Ok::<_, sqlx::Error>((role_links, user_links))
        }
        .await;

        let (role_links, user_links) = finish(tx, OPERATION, outcome).await?;
        debug!(role_links, user_links, "permission deleted");
        Ok(())
    }
}
