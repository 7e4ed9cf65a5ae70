//! Slice helpers for fetched roles and permissions.

use std::collections::HashSet;

use rolegate_core::{GuardName, PermissionId, RoleId};

use crate::{Permission, Role};

pub trait PermissionCollection {
    fn ids(&self) -> Vec<PermissionId>;
    fn names(&self) -> Vec<&str>;
    fn guard_names(&self) -> Vec<&GuardName>;
}

impl PermissionCollection for [Permission] {
    fn ids(&self) -> Vec<PermissionId> {
        self.iter().map(|p| p.id).collect()
    }

    fn names(&self) -> Vec<&str> {
        self.iter().map(|p| p.name.as_str()).collect()
    }

    fn guard_names(&self) -> Vec<&GuardName> {
        self.iter().map(|p| &p.guard_name).collect()
    }
}

pub trait RoleCollection {
    fn ids(&self) -> Vec<RoleId>;
    fn names(&self) -> Vec<&str>;
    fn guard_names(&self) -> Vec<&GuardName>;

    /// Preloaded permissions of every role, first occurrence wins.
    fn unique_permissions(&self) -> Vec<Permission>;
}

impl RoleCollection for [Role] {
    fn ids(&self) -> Vec<RoleId> {
        self.iter().map(|r| r.id).collect()
    }

    fn names(&self) -> Vec<&str> {
        self.iter().map(|r| r.name.as_str()).collect()
    }

    fn guard_names(&self) -> Vec<&GuardName> {
        self.iter().map(|r| &r.guard_name).collect()
    }

    fn unique_permissions(&self) -> Vec<Permission> {
        let mut seen = HashSet::new();
        self.iter()
            .flat_map(|r| r.permissions.iter())
            .filter(|p| seen.insert(p.id))
            .cloned()
            .collect()
    }
}

/// Order-preserving deduplication.
pub(crate) fn dedup_ids<I: Copy + Eq + std::hash::Hash>(ids: impl IntoIterator<Item = I>) -> Vec<I> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn permission(id: u64, name: &str) -> Permission {
        Permission {
            id: PermissionId::new(id),
            name: name.to_string(),
            guard_name: GuardName::from_display(name),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn role(id: u64, name: &str, permissions: Vec<Permission>) -> Role {
        Role {
            id: RoleId::new(id),
            name: name.to_string(),
            guard_name: GuardName::from_display(name),
            description: None,
            permissions,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unique_permissions_skips_repeats_across_roles() {
        let read = permission(1, "Read Invoices");
        let write = permission(2, "Write Invoices");
        let roles = vec![
            role(1, "Clerk", vec![read.clone()]),
            role(2, "Accountant", vec![read.clone(), write.clone()]),
        ];

        let unique = roles.unique_permissions();
        assert_eq!(unique.ids(), vec![PermissionId::new(1), PermissionId::new(2)]);
        assert_eq!(roles.names(), vec!["Clerk", "Accountant"]);
        assert_eq!(roles[..].guard_names()[1].as_str(), "accountant");
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let ids = dedup_ids([3u64, 1, 3, 2, 1]);
        assert_eq!(ids, vec![3, 1, 2]);
    }
}
