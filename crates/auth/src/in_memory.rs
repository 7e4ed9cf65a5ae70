//! In-memory implementation of all three repositories.
//!
//! Intended for tests/dev. One `RwLock` guards the whole state, so every
//! call (replace and cascading delete included) is atomic. Operations can be
//! made to fail on demand with [`InMemoryRbacStore::fail_on`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use rolegate_core::{AccessError, AccessResult, GuardName, IdPage, Pagination, PermissionId, RoleId, UserId};

use crate::changes::Changes;
use crate::permissions::{NewPermission, Permission};
use crate::repository::{PermissionRepository, RoleRepository, UserRepository};
use crate::roles::{NewRole, Role};

#[derive(Debug, Default)]
struct State {
    roles: BTreeMap<RoleId, Role>,
    permissions: BTreeMap<PermissionId, Permission>,
    role_permissions: BTreeSet<(RoleId, PermissionId)>,
    user_roles: BTreeSet<(UserId, RoleId)>,
    user_permissions: BTreeSet<(UserId, PermissionId)>,
    last_role_id: u64,
    last_permission_id: u64,
}

/// Roles, permissions and the three pivots held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    state: RwLock<State>,
    failures: Mutex<HashSet<&'static str>>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call of `operation` (e.g. `"roles.role_ids_of_user"`)
    /// fail with a storage error.
    pub fn fail_on(&self, operation: &'static str) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(operation);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
    }

    fn check(&self, operation: &'static str) -> AccessResult<()> {
        let failures = self
            .failures
            .lock()
            .map_err(|_| AccessError::storage(operation, "lock poisoned"))?;
        if failures.contains(operation) {
            return Err(AccessError::storage(operation, "injected failure"));
        }
        Ok(())
    }

    fn read(&self, operation: &'static str) -> AccessResult<RwLockReadGuard<'_, State>> {
        self.check(operation)?;
        self.state
            .read()
            .map_err(|_| AccessError::storage(operation, "lock poisoned"))
    }

    fn write(&self, operation: &'static str) -> AccessResult<RwLockWriteGuard<'_, State>> {
        self.check(operation)?;
        self.state
            .write()
            .map_err(|_| AccessError::storage(operation, "lock poisoned"))
    }
}

fn page<I: Copy>(ids: Vec<I>, pagination: Option<Pagination>) -> IdPage<I> {
    let total = ids.len() as u64;
    match pagination {
        Some(p) => IdPage::new(p.slice(&ids), total),
        None => IdPage::new(ids, total),
    }
}

fn related<A: Copy + Eq, B: Copy>(pairs: &BTreeSet<(A, B)>, owner: A) -> Vec<B> {
    pairs
        .iter()
        .filter(|(a, _)| *a == owner)
        .map(|(_, b)| *b)
        .collect()
}

fn count_pairs<A: Ord + Copy, B: Ord + Copy>(pairs: &BTreeSet<(A, B)>, owners: &[A], related: &[B]) -> usize {
    let owners: BTreeSet<A> = owners.iter().copied().collect();
    let related: BTreeSet<B> = related.iter().copied().collect();
    pairs
        .iter()
        .filter(|(a, b)| owners.contains(a) && related.contains(b))
        .count()
}

fn distinct<I: Ord + Copy>(ids: &[I]) -> usize {
    ids.iter().collect::<BTreeSet<_>>().len()
}

#[async_trait::async_trait]
impl PermissionRepository for InMemoryRbacStore {
    async fn get_by_id(&self, id: PermissionId) -> AccessResult<Option<Permission>> {
        let state = self.read("permissions.get_by_id")?;
        Ok(state.permissions.get(&id).cloned())
    }

    async fn get_by_guard_name(&self, guard_name: &GuardName) -> AccessResult<Option<Permission>> {
        let state = self.read("permissions.get_by_guard_name")?;
        Ok(state
            .permissions
            .values()
            .find(|p| &p.guard_name == guard_name)
            .cloned())
    }

    async fn get_many(&self, ids: &[PermissionId]) -> AccessResult<Vec<Permission>> {
        let state = self.read("permissions.get_many")?;
        let wanted: BTreeSet<_> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| state.permissions.get(&id).cloned())
            .collect())
    }

    async fn get_many_by_guard_names(&self, guard_names: &[GuardName]) -> AccessResult<Vec<Permission>> {
        let state = self.read("permissions.get_many_by_guard_names")?;
        Ok(state
            .permissions
            .values()
            .filter(|p| guard_names.contains(&p.guard_name))
            .cloned()
            .collect())
    }

    async fn get_ids(&self, pagination: Option<Pagination>) -> AccessResult<IdPage<PermissionId>> {
        let state = self.read("permissions.get_ids")?;
        Ok(page(state.permissions.keys().copied().collect(), pagination))
    }

    async fn direct_permission_ids_of_user(
        &self,
        user: UserId,
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<PermissionId>> {
        let state = self.read("permissions.direct_permission_ids_of_user")?;
        Ok(page(related(&state.user_permissions, user), pagination))
    }

    async fn find_or_create(&self, new: NewPermission) -> AccessResult<Permission> {
        let mut state = self.write("permissions.find_or_create")?;
        if let Some(existing) = state.permissions.values().find(|p| p.guard_name == new.guard_name) {
            return Ok(existing.clone());
        }

        state.last_permission_id += 1;
        let now = Utc::now();
        let permission = Permission {
            id: PermissionId::new(state.last_permission_id),
            name: new.name,
            guard_name: new.guard_name,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn update(&self, id: PermissionId, changes: Changes) -> AccessResult<Permission> {
        let mut state = self.write("permissions.update")?;
        if let Some(guard_name) = changes.guard_name() {
            if state.permissions.values().any(|p| p.id != id && p.guard_name == guard_name) {
                return Err(AccessError::storage(
                    "permissions.update",
                    format!("guard_name {guard_name} already taken"),
                ));
            }
        }

        let permission = state
            .permissions
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found("permission", id))?;
        if let Some(guard_name) = changes.guard_name() {
            permission.guard_name = guard_name;
        }
        if let Some(name) = changes.name {
            permission.name = name;
        }
        if let Some(description) = changes.description {
            permission.description = description;
        }
        permission.updated_at = Utc::now();
        Ok(permission.clone())
    }

    async fn delete(&self, id: PermissionId) -> AccessResult<()> {
        let mut state = self.write("permissions.delete")?;
        state.role_permissions.retain(|(_, p)| *p != id);
        state.user_permissions.retain(|(_, p)| *p != id);
        state.permissions.remove(&id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RoleRepository for InMemoryRbacStore {
    async fn get_by_id(&self, id: RoleId) -> AccessResult<Option<Role>> {
        let state = self.read("roles.get_by_id")?;
        Ok(state.roles.get(&id).cloned())
    }

    async fn get_by_guard_name(&self, guard_name: &GuardName) -> AccessResult<Option<Role>> {
        let state = self.read("roles.get_by_guard_name")?;
        Ok(state.roles.values().find(|r| &r.guard_name == guard_name).cloned())
    }

    async fn get_many(&self, ids: &[RoleId]) -> AccessResult<Vec<Role>> {
        let state = self.read("roles.get_many")?;
        let wanted: BTreeSet<_> = ids.iter().copied().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|id| state.roles.get(&id).cloned())
            .collect())
    }

    async fn get_many_by_guard_names(&self, guard_names: &[GuardName]) -> AccessResult<Vec<Role>> {
        let state = self.read("roles.get_many_by_guard_names")?;
        Ok(state
            .roles
            .values()
            .filter(|r| guard_names.contains(&r.guard_name))
            .cloned()
            .collect())
    }

    async fn get_ids(&self, pagination: Option<Pagination>) -> AccessResult<IdPage<RoleId>> {
        let state = self.read("roles.get_ids")?;
        Ok(page(state.roles.keys().copied().collect(), pagination))
    }

    async fn role_ids_of_user(&self, user: UserId, pagination: Option<Pagination>) -> AccessResult<IdPage<RoleId>> {
        let state = self.read("roles.role_ids_of_user")?;
        Ok(page(related(&state.user_roles, user), pagination))
    }

    async fn role_ids_of_permission(
        &self,
        permission: PermissionId,
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<RoleId>> {
        let state = self.read("roles.role_ids_of_permission")?;
        let ids = state
            .role_permissions
            .iter()
            .filter(|(_, p)| *p == permission)
            .map(|(r, _)| *r)
            .collect();
        Ok(page(ids, pagination))
    }

    async fn permission_ids_of_roles(
        &self,
        roles: &[RoleId],
        pagination: Option<Pagination>,
    ) -> AccessResult<IdPage<PermissionId>> {
        let state = self.read("roles.permission_ids_of_roles")?;
        let ids: BTreeSet<PermissionId> = state
            .role_permissions
            .iter()
            .filter(|(r, _)| roles.contains(r))
            .map(|(_, p)| *p)
            .collect();
        Ok(page(ids.into_iter().collect(), pagination))
    }

    async fn load_permissions(&self, mut roles: Vec<Role>) -> AccessResult<Vec<Role>> {
        let state = self.read("roles.load_permissions")?;
        for role in &mut roles {
            role.permissions = related(&state.role_permissions, role.id)
                .into_iter()
                .filter_map(|id| state.permissions.get(&id).cloned())
                .collect();
        }
        Ok(roles)
    }

    async fn find_or_create(&self, new: NewRole) -> AccessResult<Role> {
        let mut state = self.write("roles.find_or_create")?;
        if let Some(existing) = state.roles.values().find(|r| r.guard_name == new.guard_name) {
            return Ok(existing.clone());
        }

        state.last_role_id += 1;
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(state.last_role_id),
            name: new.name,
            guard_name: new.guard_name,
            description: new.description,
            permissions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update(&self, id: RoleId, changes: Changes) -> AccessResult<Role> {
        let mut state = self.write("roles.update")?;
        if let Some(guard_name) = changes.guard_name() {
            if state.roles.values().any(|r| r.id != id && r.guard_name == guard_name) {
                return Err(AccessError::storage(
                    "roles.update",
                    format!("guard_name {guard_name} already taken"),
                ));
            }
        }

        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| AccessError::not_found("role", id))?;
        if let Some(guard_name) = changes.guard_name() {
            role.guard_name = guard_name;
        }
        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = description;
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete(&self, id: RoleId) -> AccessResult<()> {
        let mut state = self.write("roles.delete")?;
        state.role_permissions.retain(|(r, _)| *r != id);
        state.user_roles.retain(|(_, r)| *r != id);
        state.roles.remove(&id);
        Ok(())
    }

    async fn add_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()> {
        let mut state = self.write("roles.add_permissions")?;
        state.role_permissions.extend(permissions.iter().map(|p| (role, *p)));
        Ok(())
    }

    async fn replace_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()> {
        let mut state = self.write("roles.replace_permissions")?;
        state.role_permissions.retain(|(r, _)| *r != role);
        state.role_permissions.extend(permissions.iter().map(|p| (role, *p)));
        Ok(())
    }

    async fn remove_permissions(&self, role: RoleId, permissions: &[PermissionId]) -> AccessResult<()> {
        let mut state = self.write("roles.remove_permissions")?;
        for permission in permissions {
            state.role_permissions.remove(&(role, *permission));
        }
        Ok(())
    }

    async fn clear_permissions(&self, role: RoleId) -> AccessResult<()> {
        let mut state = self.write("roles.clear_permissions")?;
        state.role_permissions.retain(|(r, _)| *r != role);
        Ok(())
    }

    async fn has_permission(&self, roles: &[RoleId], permission: PermissionId) -> AccessResult<bool> {
        let state = self.read("roles.has_permission")?;
        Ok(count_pairs(&state.role_permissions, roles, &[permission]) > 0)
    }

    async fn has_all_permissions(&self, roles: &[RoleId], permissions: &[PermissionId]) -> AccessResult<bool> {
        let state = self.read("roles.has_all_permissions")?;
        let count = count_pairs(&state.role_permissions, roles, permissions);
        Ok(count == distinct(roles) * distinct(permissions))
    }

    async fn has_any_permissions(&self, roles: &[RoleId], permissions: &[PermissionId]) -> AccessResult<bool> {
        let state = self.read("roles.has_any_permissions")?;
        Ok(count_pairs(&state.role_permissions, roles, permissions) > 0)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryRbacStore {
    async fn add_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()> {
        let mut state = self.write("users.add_roles")?;
        state.user_roles.extend(roles.iter().map(|r| (user, *r)));
        Ok(())
    }

    async fn replace_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()> {
        let mut state = self.write("users.replace_roles")?;
        state.user_roles.retain(|(u, _)| *u != user);
        state.user_roles.extend(roles.iter().map(|r| (user, *r)));
        Ok(())
    }

    async fn remove_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<()> {
        let mut state = self.write("users.remove_roles")?;
        for role in roles {
            state.user_roles.remove(&(user, *role));
        }
        Ok(())
    }

    async fn clear_roles(&self, user: UserId) -> AccessResult<()> {
        let mut state = self.write("users.clear_roles")?;
        state.user_roles.retain(|(u, _)| *u != user);
        Ok(())
    }

    async fn add_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()> {
        let mut state = self.write("users.add_permissions")?;
        state.user_permissions.extend(permissions.iter().map(|p| (user, *p)));
        Ok(())
    }

    async fn replace_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()> {
        let mut state = self.write("users.replace_permissions")?;
        state.user_permissions.retain(|(u, _)| *u != user);
        state.user_permissions.extend(permissions.iter().map(|p| (user, *p)));
        Ok(())
    }

    async fn remove_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<()> {
        let mut state = self.write("users.remove_permissions")?;
        for permission in permissions {
            state.user_permissions.remove(&(user, *permission));
        }
        Ok(())
    }

    async fn clear_permissions(&self, user: UserId) -> AccessResult<()> {
        let mut state = self.write("users.clear_permissions")?;
        state.user_permissions.retain(|(u, _)| *u != user);
        Ok(())
    }

    async fn has_role(&self, user: UserId, role: RoleId) -> AccessResult<bool> {
        let state = self.read("users.has_role")?;
        Ok(state.user_roles.contains(&(user, role)))
    }

    async fn has_all_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<bool> {
        let state = self.read("users.has_all_roles")?;
        Ok(count_pairs(&state.user_roles, &[user], roles) == distinct(roles))
    }

    async fn has_any_roles(&self, user: UserId, roles: &[RoleId]) -> AccessResult<bool> {
        let state = self.read("users.has_any_roles")?;
        Ok(count_pairs(&state.user_roles, &[user], roles) > 0)
    }

    async fn has_direct_permission(&self, user: UserId, permission: PermissionId) -> AccessResult<bool> {
        let state = self.read("users.has_direct_permission")?;
        Ok(state.user_permissions.contains(&(user, permission)))
    }

    async fn has_all_direct_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<bool> {
        let state = self.read("users.has_all_direct_permissions")?;
        Ok(count_pairs(&state.user_permissions, &[user], permissions) == distinct(permissions))
    }

    async fn has_any_direct_permissions(&self, user: UserId, permissions: &[PermissionId]) -> AccessResult<bool> {
        let state = self.read("users.has_any_direct_permissions")?;
        Ok(count_pairs(&state.user_permissions, &[user], permissions) > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(ids: &[u64]) -> Vec<PermissionId> {
        ids.iter().copied().map(PermissionId::new).collect()
    }

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(fut)
    }

    #[tokio::test]
    async fn find_or_create_is_keyed_on_guard_name() {
        let store = InMemoryRbacStore::new();
        let first = PermissionRepository::find_or_create(&store, NewPermission::new("Edit Post", None))
            .await
            .unwrap();
        let again = PermissionRepository::find_or_create(&store, NewPermission::new("edit-post", Some("ignored".into())))
            .await
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(PermissionRepository::get_ids(&store, None).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn deleting_a_permission_purges_its_pivots() {
        let store = InMemoryRbacStore::new();
        let perm = PermissionRepository::find_or_create(&store, NewPermission::new("export", None))
            .await
            .unwrap();
        let a = RoleRepository::find_or_create(&store, NewRole::new("a", None)).await.unwrap();
        let b = RoleRepository::find_or_create(&store, NewRole::new("b", None)).await.unwrap();
        RoleRepository::add_permissions(&store, a.id, &[perm.id]).await.unwrap();
        RoleRepository::add_permissions(&store, b.id, &[perm.id]).await.unwrap();
        UserRepository::add_permissions(&store, UserId::new(1), &[perm.id]).await.unwrap();

        PermissionRepository::delete(&store, perm.id).await.unwrap();

        let state = store.state.read().unwrap();
        assert!(state.permissions.is_empty());
        assert!(state.role_permissions.is_empty());
        assert!(state.user_permissions.is_empty());
    }

    #[tokio::test]
    async fn renaming_onto_an_existing_guard_name_fails() {
        let store = InMemoryRbacStore::new();
        RoleRepository::find_or_create(&store, NewRole::new("admin", None)).await.unwrap();
        let editor = RoleRepository::find_or_create(&store, NewRole::new("editor", None)).await.unwrap();

        let err = RoleRepository::update(&store, editor.id, Changes::rename("Admin")).await.unwrap_err();
        assert!(matches!(err, AccessError::Storage { .. }));

        let renamed = RoleRepository::update(&store, editor.id, Changes::rename("Chief Editor"))
            .await
            .unwrap();
        assert_eq!(renamed.guard_name.as_str(), "chief-editor");
    }

    #[tokio::test]
    async fn injected_failures_surface_as_storage_errors() {
        let store = InMemoryRbacStore::new();
        store.fail_on("users.add_roles");

        let err = UserRepository::add_roles(&store, UserId::new(1), &[RoleId::new(1)])
            .await
            .unwrap_err();
        assert_eq!(err, AccessError::storage("users.add_roles", "injected failure"));

        store.clear_failures();
        UserRepository::add_roles(&store, UserId::new(1), &[RoleId::new(1)]).await.unwrap();
    }

    #[tokio::test]
    async fn multi_role_all_requires_every_pair() {
        let store = InMemoryRbacStore::new();
        let (r1, r2) = (RoleId::new(1), RoleId::new(2));
        RoleRepository::add_permissions(&store, r1, &p(&[1, 2])).await.unwrap();
        RoleRepository::add_permissions(&store, r2, &p(&[1])).await.unwrap();

        assert!(RoleRepository::has_all_permissions(&store, &[r1], &p(&[1, 2])).await.unwrap());
        assert!(!RoleRepository::has_all_permissions(&store, &[r1, r2], &p(&[1, 2])).await.unwrap());
        assert!(RoleRepository::has_all_permissions(&store, &[r1, r2, r1], &p(&[1, 1])).await.unwrap());
        assert!(RoleRepository::has_permission(&store, &[r1, r2], PermissionId::new(2)).await.unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn add_is_set_union(first in proptest::collection::vec(1u64..20, 0..10),
                            second in proptest::collection::vec(1u64..20, 0..10)) {
            let store = InMemoryRbacStore::new();
            let user = UserId::new(9);
            let ids = block_on(async {
                UserRepository::add_permissions(&store, user, &p(&first)).await.unwrap();
                UserRepository::add_permissions(&store, user, &p(&second)).await.unwrap();
                PermissionRepository::direct_permission_ids_of_user(&store, user, None).await.unwrap()
            });

            let expected: BTreeSet<u64> = first.iter().chain(second.iter()).copied().collect();
            prop_assert_eq!(ids.ids, p(&expected.into_iter().collect::<Vec<_>>()));
        }

        #[test]
        fn replace_with_empty_equals_clear(initial in proptest::collection::vec(1u64..20, 0..10),
                                           replacement in proptest::collection::vec(1u64..20, 0..10)) {
            let replaced = InMemoryRbacStore::new();
            let cleared = InMemoryRbacStore::new();
            let role = RoleId::new(3);

            let (left, right) = block_on(async {
                for store in [&replaced, &cleared] {
                    RoleRepository::add_permissions(store, role, &p(&initial)).await.unwrap();
                    RoleRepository::replace_permissions(store, role, &p(&replacement)).await.unwrap();
                }
                RoleRepository::replace_permissions(&replaced, role, &[]).await.unwrap();
                RoleRepository::clear_permissions(&cleared, role).await.unwrap();
                (
                    RoleRepository::permission_ids_of_roles(&replaced, &[role], None).await.unwrap(),
                    RoleRepository::permission_ids_of_roles(&cleared, &[role], None).await.unwrap(),
                )
            });

            prop_assert_eq!(left.total, 0);
            prop_assert_eq!(left, right);
        }
    }
}
