//! Resolution engine.
//!
//! [`AccessControl`] is the public façade: it turns caller-supplied
//! identifiers into stored entities, delegates pivot work to the
//! repositories and folds the results into booleans or deduplicated
//! collections. It keeps no state of its own beyond the repository handles,
//! so one instance can be shared behind an `Arc`.
//!
//! ## Resolution rules
//!
//! - A single name or id that matches nothing fails with `NotFound` in
//!   singular getters, mutators and checks alike. The plural getters
//!   (`get_roles`, `get_permissions`) return whatever matched. Given a list, the
//!   singular accessors (`get_role`, `delete_permission`, the role argument of
//!   the role mutators, ...) use the first requested key that resolves.
//! - Lists skip keys that match nothing, except in `*_has_all_*` checks.
//! - `*_has_all_*` checks are false when any requested key does not resolve;
//!   an unknown key is never treated as satisfied, so these are stricter than
//!   checking only the keys that resolved. An empty request is vacuously
//!   true. `*_has_any_*` checks over an empty set are false.
//!
//! Any repository failure aborts the call; nothing partial is returned.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, Span};

use rolegate_core::{
    AccessError, AccessResult, Entity, GuardName, PageDefaults, PageRequest, Paged, Pagination, PermissionId,
    RoleId, UserId,
};

use crate::changes::Changes;
use crate::collections::{dedup_ids, PermissionCollection, RoleCollection};
use crate::lookup::{EntityRef, Lookup, PermissionRef, RoleRef};
use crate::options::{PermissionQuery, RoleQuery};
use crate::permissions::{NewPermission, Permission};
use crate::repository::{PermissionRepository, RoleRepository, UserRepository};
use crate::roles::{NewRole, Role};

/// Role/permission resolution over pluggable repositories.
#[derive(Clone)]
pub struct AccessControl {
    roles: Arc<dyn RoleRepository>,
    permissions: Arc<dyn PermissionRepository>,
    users: Arc<dyn UserRepository>,
    page_defaults: PageDefaults,
}

impl core::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccessControl")
            .field("page_defaults", &self.page_defaults)
            .finish_non_exhaustive()
    }
}

impl AccessControl {
    pub fn new(
        roles: Arc<dyn RoleRepository>,
        permissions: Arc<dyn PermissionRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            roles,
            permissions,
            users,
            page_defaults: PageDefaults::default(),
        }
    }

    /// Build over one store that implements all three repositories.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: RoleRepository + PermissionRepository + UserRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_page_defaults(mut self, page_defaults: PageDefaults) -> Self {
        self.page_defaults = page_defaults;
        self
    }

    fn pagination(&self, request: Option<PageRequest>) -> Option<Pagination> {
        request.map(|r| Pagination::resolve(r, self.page_defaults))
    }

    // ---- resolution ------------------------------------------------------

    async fn fetch_roles(&self, lookup: &Lookup<RoleId>) -> AccessResult<Vec<Role>> {
        match lookup {
            Lookup::Ids(ids) if ids.is_empty() => Ok(Vec::new()),
            Lookup::Ids(ids) => self.roles.get_many(ids).await,
            Lookup::GuardNames(names) => self.roles.get_many_by_guard_names(names).await,
        }
    }

    async fn fetch_permissions(&self, lookup: &Lookup<PermissionId>) -> AccessResult<Vec<Permission>> {
        match lookup {
            Lookup::Ids(ids) if ids.is_empty() => Ok(Vec::new()),
            Lookup::Ids(ids) => self.permissions.get_many(ids).await,
            Lookup::GuardNames(names) => self.permissions.get_many_by_guard_names(names).await,
        }
    }

    async fn find_role(&self, role: &RoleRef) -> AccessResult<Role> {
        let found = match role {
            EntityRef::Id(id) => self.roles.get_by_id(*id).await?,
            EntityRef::Name(name) => self.roles.get_by_guard_name(&GuardName::from_display(name)).await?,
            EntityRef::Ids(_) | EntityRef::Names(_) => {
                let lookup = role.lookup();
                first_requested(&lookup, self.fetch_roles(&lookup).await?)
            }
        };
        found.ok_or_else(|| AccessError::not_found(Role::KIND, role.lookup()))
    }

    async fn find_permission(&self, permission: &PermissionRef) -> AccessResult<Permission> {
        let found = match permission {
            EntityRef::Id(id) => self.permissions.get_by_id(*id).await?,
            EntityRef::Name(name) => {
                self.permissions
                    .get_by_guard_name(&GuardName::from_display(name))
                    .await?
            }
            EntityRef::Ids(_) | EntityRef::Names(_) => {
                let lookup = permission.lookup();
                first_requested(&lookup, self.fetch_permissions(&lookup).await?)
            }
        };
        found.ok_or_else(|| AccessError::not_found(Permission::KIND, permission.lookup()))
    }

    /// Resolve a role reference to its stored ids plus whether every requested
    /// key matched. A single name or id that matches nothing is `NotFound`.
    async fn resolve_role_ids(&self, role: &RoleRef) -> AccessResult<(Vec<RoleId>, bool)> {
        if !role.is_plural() {
            return Ok((vec![self.find_role(role).await?.id], true));
        }
        let lookup = role.lookup();
        let found = self.fetch_roles(&lookup).await?;
        Ok((found.ids(), found.len() == lookup.len()))
    }

    async fn resolve_permission_ids(&self, permission: &PermissionRef) -> AccessResult<(Vec<PermissionId>, bool)> {
        if !permission.is_plural() {
            return Ok((vec![self.find_permission(permission).await?.id], true));
        }
        let lookup = permission.lookup();
        let found = self.fetch_permissions(&lookup).await?;
        Ok((found.ids(), found.len() == lookup.len()))
    }

    // ---- roles -----------------------------------------------------------

    /// Fetch one role by name or id.
    #[instrument(skip(self, role), err)]
    pub async fn get_role(&self, role: impl Into<RoleRef>, with_permissions: bool) -> AccessResult<Role> {
        let role = self.find_role(&role.into()).await?;
        if !with_permissions {
            return Ok(role);
        }
        let key = role.id;
        self.roles
            .load_permissions(vec![role])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::not_found(Role::KIND, key))
    }

    /// Fetch every role matching the names or ids; unknown keys are skipped.
    #[instrument(skip(self, roles), err)]
    pub async fn get_roles(&self, roles: impl Into<RoleRef>, with_permissions: bool) -> AccessResult<Vec<Role>> {
        let roles = self.fetch_roles(&roles.into().lookup()).await?;
        if with_permissions && !roles.is_empty() {
            return self.roles.load_permissions(roles).await;
        }
        Ok(roles)
    }

    async fn hydrate_roles(&self, ids: Vec<RoleId>, total: u64, query: RoleQuery) -> AccessResult<Paged<Role>> {
        let mut items = if ids.is_empty() {
            Vec::new()
        } else {
            self.roles.get_many(&ids).await?
        };
        if query.with_permissions && !items.is_empty() {
            items = self.roles.load_permissions(items).await?;
        }
        Ok(Paged { items, total })
    }

    #[instrument(skip(self), err)]
    pub async fn get_all_roles(&self, query: RoleQuery) -> AccessResult<Paged<Role>> {
        let page = self.roles.get_ids(self.pagination(query.page)).await?;
        self.hydrate_roles(page.ids, page.total, query).await
    }

    #[instrument(skip(self), fields(user = %user), err)]
    pub async fn get_roles_of_user(&self, user: UserId, query: RoleQuery) -> AccessResult<Paged<Role>> {
        let page = self
            .roles
            .role_ids_of_user(user, self.pagination(query.page))
            .await?;
        self.hydrate_roles(page.ids, page.total, query).await
    }

    /// Roles that carry the given permission.
    #[instrument(skip(self, permission), err)]
    pub async fn get_roles_of_permission(
        &self,
        permission: impl Into<PermissionRef>,
        query: RoleQuery,
    ) -> AccessResult<Paged<Role>> {
        let permission = self.find_permission(&permission.into()).await?;
        let page = self
            .roles
            .role_ids_of_permission(permission.id, self.pagination(query.page))
            .await?;
        self.hydrate_roles(page.ids, page.total, query).await
    }

    /// Create a role, or return the existing one with the same guard name.
    #[instrument(skip(self, description), err)]
    pub async fn create_role(&self, name: &str, description: Option<&str>) -> AccessResult<Role> {
        let role = self
            .roles
            .find_or_create(NewRole::new(name, description.map(str::to_string)))
            .await?;
        debug!(role_id = %role.id, guard_name = %role.guard_name, "role ready");
        Ok(role)
    }

    #[instrument(skip(self, role), err)]
    pub async fn update_role(&self, role: impl Into<RoleRef>, changes: Changes) -> AccessResult<Role> {
        let role = self.find_role(&role.into()).await?;
        if changes.is_empty() {
            return Ok(role);
        }
        self.roles.update(role.id, changes).await
    }

    /// Delete a role together with every pivot row that references it.
    #[instrument(skip_all, fields(role_id = tracing::field::Empty), err)]
    pub async fn delete_role(&self, role: impl Into<RoleRef>) -> AccessResult<()> {
        let role = self.find_role(&role.into()).await?;
        Span::current().record("role_id", role.id.get());
        self.roles.delete(role.id).await
    }

    // ---- role permissions ------------------------------------------------

    #[instrument(skip_all, err)]
    pub async fn add_permissions_to_role(
        &self,
        role: impl Into<RoleRef>,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<()> {
        let role = self.find_role(&role.into()).await?;
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.roles.add_permissions(role.id, &ids).await
    }

    /// Overwrite the role's permission set; an empty resolved set clears it.
    #[instrument(skip_all, err)]
    pub async fn replace_permissions_of_role(
        &self,
        role: impl Into<RoleRef>,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<()> {
        let role = self.find_role(&role.into()).await?;
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return self.roles.clear_permissions(role.id).await;
        }
        self.roles.replace_permissions(role.id, &ids).await
    }

    #[instrument(skip_all, err)]
    pub async fn remove_permissions_from_role(
        &self,
        role: impl Into<RoleRef>,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<()> {
        let role = self.find_role(&role.into()).await?;
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.roles.remove_permissions(role.id, &ids).await
    }

    #[instrument(skip_all, err)]
    pub async fn clear_permissions_of_role(&self, role: impl Into<RoleRef>) -> AccessResult<()> {
        let role = self.find_role(&role.into()).await?;
        self.roles.clear_permissions(role.id).await
    }

    // ---- permissions -----------------------------------------------------

    #[instrument(skip_all, err)]
    pub async fn get_permission(&self, permission: impl Into<PermissionRef>) -> AccessResult<Permission> {
        self.find_permission(&permission.into()).await
    }

    #[instrument(skip_all, err)]
    pub async fn get_permissions(&self, permissions: impl Into<PermissionRef>) -> AccessResult<Vec<Permission>> {
        self.fetch_permissions(&permissions.into().lookup()).await
    }

    async fn hydrate_permissions(&self, ids: Vec<PermissionId>, total: u64) -> AccessResult<Paged<Permission>> {
        let items = if ids.is_empty() {
            Vec::new()
        } else {
            self.permissions.get_many(&ids).await?
        };
        Ok(Paged { items, total })
    }

    #[instrument(skip(self), err)]
    pub async fn get_all_permissions(&self, query: PermissionQuery) -> AccessResult<Paged<Permission>> {
        let page = self.permissions.get_ids(self.pagination(query.page)).await?;
        self.hydrate_permissions(page.ids, page.total).await
    }

    #[instrument(skip(self), fields(user = %user), err)]
    pub async fn get_direct_permissions_of_user(
        &self,
        user: UserId,
        query: PermissionQuery,
    ) -> AccessResult<Paged<Permission>> {
        let page = self
            .permissions
            .direct_permission_ids_of_user(user, self.pagination(query.page))
            .await?;
        self.hydrate_permissions(page.ids, page.total).await
    }

    /// Permissions attached to any of the given roles, deduplicated.
    #[instrument(skip(self, roles), err)]
    pub async fn get_permissions_of_roles(
        &self,
        roles: impl Into<RoleRef>,
        query: PermissionQuery,
    ) -> AccessResult<Paged<Permission>> {
        let (role_ids, _) = self.resolve_role_ids(&roles.into()).await?;
        if role_ids.is_empty() {
            return Ok(Paged {
                items: Vec::new(),
                total: 0,
            });
        }
        let page = self
            .roles
            .permission_ids_of_roles(&role_ids, self.pagination(query.page))
            .await?;
        self.hydrate_permissions(page.ids, page.total).await
    }

    async fn effective_permission_ids(&self, user: UserId) -> AccessResult<Vec<PermissionId>> {
        let role_ids = self.roles.role_ids_of_user(user, None).await?.ids;
        let from_roles = if role_ids.is_empty() {
            Vec::new()
        } else {
            self.roles.permission_ids_of_roles(&role_ids, None).await?.ids
        };
        let direct = self
            .permissions
            .direct_permission_ids_of_user(user, None)
            .await?
            .ids;
        Ok(dedup_ids(from_roles.into_iter().chain(direct)))
    }

    /// Direct grants unioned with every permission of every role of the user.
    #[instrument(skip(self), fields(user = %user, count = tracing::field::Empty), err)]
    pub async fn effective_permissions_of_user(&self, user: UserId) -> AccessResult<Vec<Permission>> {
        let ids = self.effective_permission_ids(user).await?;
        Span::current().record("count", ids.len());
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.permissions.get_many(&ids).await
    }

    #[instrument(skip(self, description), err)]
    pub async fn create_permission(&self, name: &str, description: Option<&str>) -> AccessResult<Permission> {
        let permission = self
            .permissions
            .find_or_create(NewPermission::new(name, description.map(str::to_string)))
            .await?;
        debug!(permission_id = %permission.id, guard_name = %permission.guard_name, "permission ready");
        Ok(permission)
    }

    #[instrument(skip(self, permission), err)]
    pub async fn update_permission(
        &self,
        permission: impl Into<PermissionRef>,
        changes: Changes,
    ) -> AccessResult<Permission> {
        let permission = self.find_permission(&permission.into()).await?;
        if changes.is_empty() {
            return Ok(permission);
        }
        self.permissions.update(permission.id, changes).await
    }

    /// Delete a permission together with every pivot row that references it.
    #[instrument(skip_all, fields(permission_id = tracing::field::Empty), err)]
    pub async fn delete_permission(&self, permission: impl Into<PermissionRef>) -> AccessResult<()> {
        let permission = self.find_permission(&permission.into()).await?;
        Span::current().record("permission_id", permission.id.get());
        self.permissions.delete(permission.id).await
    }

    // ---- user relations --------------------------------------------------

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn add_permissions_to_user(&self, user: UserId, permissions: impl Into<PermissionRef>) -> AccessResult<()> {
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.users.add_permissions(user, &ids).await
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn replace_permissions_of_user(
        &self,
        user: UserId,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<()> {
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return self.users.clear_permissions(user).await;
        }
        self.users.replace_permissions(user, &ids).await
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn remove_permissions_from_user(
        &self,
        user: UserId,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<()> {
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.users.remove_permissions(user, &ids).await
    }

    #[instrument(skip(self), fields(user = %user), err)]
    pub async fn clear_permissions_of_user(&self, user: UserId) -> AccessResult<()> {
        self.users.clear_permissions(user).await
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    pub async fn add_roles_to_user(&self, user: UserId, roles: impl Into<RoleRef>) -> AccessResult<()> {
        let (ids, _) = self.resolve_role_ids(&roles.into()).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.users.add_roles(user, &ids).await
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    pub async fn replace_roles_of_user(&self, user: UserId, roles: impl Into<RoleRef>) -> AccessResult<()> {
        let (ids, _) = self.resolve_role_ids(&roles.into()).await?;
        if ids.is_empty() {
            return self.users.clear_roles(user).await;
        }
        self.users.replace_roles(user, &ids).await
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    pub async fn remove_roles_from_user(&self, user: UserId, roles: impl Into<RoleRef>) -> AccessResult<()> {
        let (ids, _) = self.resolve_role_ids(&roles.into()).await?;
        if ids.is_empty() {
            return Ok(());
        }
        self.users.remove_roles(user, &ids).await
    }

    #[instrument(skip(self), fields(user = %user), err)]
    pub async fn clear_roles_of_user(&self, user: UserId) -> AccessResult<()> {
        self.users.clear_roles(user).await
    }

    // ---- role checks -----------------------------------------------------

    /// Does any of the given roles carry the permission?
    #[instrument(skip_all, err)]
    pub async fn role_has_permission(
        &self,
        roles: impl Into<RoleRef>,
        permission: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (role_ids, _) = self.resolve_role_ids(&roles.into()).await?;
        let permission = self.find_permission(&permission.into()).await?;
        if role_ids.is_empty() {
            return Ok(false);
        }
        self.roles.has_permission(&role_ids, permission.id).await
    }

    /// Does every one of the given roles carry every one of the permissions?
    #[instrument(skip_all, err)]
    pub async fn role_has_all_permissions(
        &self,
        roles: impl Into<RoleRef>,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (role_ids, all_roles) = self.resolve_role_ids(&roles.into()).await?;
        let (permission_ids, all_permissions) = self.resolve_permission_ids(&permissions.into()).await?;
        if !all_roles || !all_permissions {
            debug!("unresolved keys in request");
            return Ok(false);
        }
        if permission_ids.is_empty() {
            return Ok(true);
        }
        if role_ids.is_empty() {
            return Ok(false);
        }
        self.roles.has_all_permissions(&role_ids, &permission_ids).await
    }

    #[instrument(skip_all, err)]
    pub async fn role_has_any_permissions(
        &self,
        roles: impl Into<RoleRef>,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (role_ids, _) = self.resolve_role_ids(&roles.into()).await?;
        let (permission_ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if role_ids.is_empty() || permission_ids.is_empty() {
            return Ok(false);
        }
        self.roles.has_any_permissions(&role_ids, &permission_ids).await
    }

    // ---- user checks -----------------------------------------------------

    #[instrument(skip(self, role), fields(user = %user), err)]
    pub async fn user_has_role(&self, user: UserId, role: impl Into<RoleRef>) -> AccessResult<bool> {
        let role = self.find_role(&role.into()).await?;
        self.users.has_role(user, role.id).await
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    pub async fn user_has_all_roles(&self, user: UserId, roles: impl Into<RoleRef>) -> AccessResult<bool> {
        let (ids, complete) = self.resolve_role_ids(&roles.into()).await?;
        if !complete {
            return Ok(false);
        }
        if ids.is_empty() {
            return Ok(true);
        }
        self.users.has_all_roles(user, &ids).await
    }

    #[instrument(skip(self, roles), fields(user = %user), err)]
    pub async fn user_has_any_roles(&self, user: UserId, roles: impl Into<RoleRef>) -> AccessResult<bool> {
        let (ids, _) = self.resolve_role_ids(&roles.into()).await?;
        if ids.is_empty() {
            return Ok(false);
        }
        self.users.has_any_roles(user, &ids).await
    }

    #[instrument(skip(self, permission), fields(user = %user), err)]
    pub async fn user_has_direct_permission(
        &self,
        user: UserId,
        permission: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let permission = self.find_permission(&permission.into()).await?;
        self.users.has_direct_permission(user, permission.id).await
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn user_has_all_direct_permissions(
        &self,
        user: UserId,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (ids, complete) = self.resolve_permission_ids(&permissions.into()).await?;
        if !complete {
            return Ok(false);
        }
        if ids.is_empty() {
            return Ok(true);
        }
        self.users.has_all_direct_permissions(user, &ids).await
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn user_has_any_direct_permissions(
        &self,
        user: UserId,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return Ok(false);
        }
        self.users.has_any_direct_permissions(user, &ids).await
    }

    /// Does the user hold the permission, directly or through any role?
    ///
    /// A direct grant answers without reading the user's roles.
    #[instrument(skip(self, permission), fields(user = %user, permission_id = tracing::field::Empty), err)]
    pub async fn user_has_permission(&self, user: UserId, permission: impl Into<PermissionRef>) -> AccessResult<bool> {
        let permission = self.find_permission(&permission.into()).await?;
        Span::current().record("permission_id", permission.id.get());

        if self.users.has_direct_permission(user, permission.id).await? {
            debug!("granted directly");
            return Ok(true);
        }

        let role_ids = self.roles.role_ids_of_user(user, None).await?.ids;
        if role_ids.is_empty() {
            return Ok(false);
        }
        let granted = self.roles.has_permission(&role_ids, permission.id).await?;
        debug!(granted, roles = role_ids.len(), "checked role grants");
        Ok(granted)
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn user_has_all_permissions(
        &self,
        user: UserId,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (ids, complete) = self.resolve_permission_ids(&permissions.into()).await?;
        if !complete {
            return Ok(false);
        }
        if ids.is_empty() {
            return Ok(true);
        }
        let effective: HashSet<PermissionId> = self.effective_permission_ids(user).await?.into_iter().collect();
        Ok(ids.iter().all(|id| effective.contains(id)))
    }

    #[instrument(skip(self, permissions), fields(user = %user), err)]
    pub async fn user_has_any_permissions(
        &self,
        user: UserId,
        permissions: impl Into<PermissionRef>,
    ) -> AccessResult<bool> {
        let (ids, _) = self.resolve_permission_ids(&permissions.into()).await?;
        if ids.is_empty() {
            return Ok(false);
        }
        let effective: HashSet<PermissionId> = self.effective_permission_ids(user).await?.into_iter().collect();
        Ok(ids.iter().any(|id| effective.contains(id)))
    }
}

/// Pick the entity matching the earliest requested key.
fn first_requested<E: Entity>(lookup: &Lookup<E::Id>, found: Vec<E>) -> Option<E> {
    let position = match lookup {
        Lookup::Ids(ids) => ids
            .iter()
            .find_map(|id| found.iter().position(|e| e.id() == *id)),
        Lookup::GuardNames(names) => names
            .iter()
            .find_map(|name| found.iter().position(|e| e.guard_name() == name)),
    };
    position.and_then(|idx| found.into_iter().nth(idx))
}
