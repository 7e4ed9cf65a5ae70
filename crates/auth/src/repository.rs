//! Storage-facing traits.
//!
//! The engine talks to storage only through these three traits. Entity
//! repositories own the role and permission rows (and the role↔permission
//! pivot, owned by the role side); the user repository owns the two
//! user-side pivots. Implementations must be `Send + Sync` so one engine can
//! be shared across tasks.
//!
//! ## Pivot contract
//!
//! Every pivot pair is unique. Inserting an existing pair is absorbed, and the
//! `has_all_*` predicates compare pivot row counts against the number of
//! distinct ids asked for, which is only sound under that uniqueness.
//! Implementations deduplicate incoming id slices before counting.
//!
//! ## Atomicity
//!
//! `replace_*` and `delete` run as one transaction each. A failure partway
//! leaves the pre-call state and surfaces as
//! [`AccessError::TransactionAborted`](rolegate_core::AccessError::TransactionAborted).

use rolegate_core::{AccessResult, GuardName, IdPage, Pagination, PermissionId, RoleId, UserId};

use crate::changes::Changes;
use crate::permissions::{NewPermission, Permission};
use crate::roles::{NewRole, Role};

#[async_trait::async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn get_by_id(&self, id: PermissionId) -> AccessResult<Option<Permission>>;

    async fn get_by_guard_name(&self, guard_name: &GuardName) -> AccessResult<Option<Permission>>;

    /// Missing ids are skipped. Output is ordered by id.
    async fn get_many(&self, ids: &[PermissionId]) -> AccessResult<Vec<Permission>>;

    async fn get_many_by_guard_names(&self, guard_names: &[GuardName]) -> AccessResult<Vec<Permission>>;

    /// All permission ids, optionally paginated, with the unpaginated total.
    async fn get_ids(&self, pagination: Option<Pagination>) -> AccessResult<IdPage<PermissionId>>;

    async fn direct_permission_ids_of_user(
        &self,
        user: UserId,
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<PermissionId>>;

    /// Return the row with `new.guard_name`, inserting it first if absent.
    async fn find_or_create(&self, new: NewPermission) -> AccessResult<Permission>;

    async fn update(&self, id: PermissionId, changes: Changes) -> AccessResult<Permission>;

    /// Delete the row together with its role and user pivot rows.
    async fn delete(&self, id: PermissionId) -> AccessResult<()>;
}

#[async_trait::async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get_by_id(&self, id: RoleId) -> AccessResult<Option<Role>>;

    async fn get_by_guard_name(&self, guard_name: &GuardName) -> AccessResult<Option<Role>>;

    /// Missing ids are skipped. Output is ordered by id.
    async fn get_many(&self, ids: &[RoleId]) -> AccessResult<Vec<Role>>;

    async fn get_many_by_guard_names(&self, guard_names: &[GuardName]) -> AccessResult<Vec<Role>>;

    async fn get_ids(&self, pagination: Option<Pagination>) -> AccessResult<IdPage<RoleId>>;

    async fn role_ids_of_user(&self, user: UserId, pagination: Option<Pagination>) -> AccessResult<IdPage<RoleId>>;

    async fn role_ids_of_permission(
        &self,
        permission: PermissionId,
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<RoleId>>;

    /// Permission ids attached to any of `roles`, deduplicated across roles.
    async fn permission_ids_of_roles(
        &self,
        roles: &[RoleId],
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<PermissionId>>;

    /// Fill `permissions` on each role.
    async fn load_permissions(&self, roles: Vec<Role>) -> AccessResult<Vec<Role>>;

    async fn find_or_create(&self, new: NewRole) -> AccessResult<Role>;

    async fn update(&self, id: RoleId, changes: Changes) -> AccessResult<Role>;

    /// Delete the row together with its permission and user pivot rows.
    async fn delete(&self, id: RoleId) -> AccessResult<()>;

    async fn add_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()>;

    async fn replace_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()>;

    async fn remove_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()>;

    async fn clear_permissions(&self, role: RoleId) -> AccessResult<()>;

    /// Any of `roles` carries `permission`.
    async fn has_permission(&self, roles: &[RoleId], permission: PermissionId) -> AccessResult<bool>;

    /// Every one of `roles` carries every one of `permissions`.
    async fn has_all_permissions(&self, roles: &[RoleId], permissions: &[PermissionId]) -> AccessResult<bool>;

    async fn has_any_permissions(&self, roles: &[RoleId], permissions: &[PermissionId]) -> AccessResult<bool>;
}

/// User-side pivots. Users themselves live outside this crate.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn add_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()>;

    async fn replace_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()>;

    async fn remove_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()>;

    async fn clear_roles(&self, user: UserId) -> AccessResult<()>;

    async fn add_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()>;

    async fn replace_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()>;

    async fn remove_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()>;

    async fn clear_permissions(&self, user: UserId) -> AccessResult<()>;

    async fn has_role(&self, user: UserId, role: RoleId) -> AccessResult<bool>;

    async fn has_all_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<bool>;

    async fn has_any_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<bool>;

    async fn has_direct_permission(&self, user: UserId, permission: PermissionId) -> AccessResult<bool>;

    async fn has_all_direct_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<bool>;

    async fn has_any_direct_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<bool>;
}
