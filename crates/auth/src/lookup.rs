//! Identifier resolution.
//!
//! Public entry points accept "a name or an id, one or many". That is an
//! [`EntityRef`]: a tagged union the caller builds directly, or converts from
//! a JSON value at a binding boundary. Mixed lists cannot be constructed.

use std::collections::HashSet;

use serde_json::Value;

use rolegate_core::{AccessError, GuardName, PermissionId, RoleId};

use crate::collections::dedup_ids;

/// Reference to one or more roles or permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef<I> {
    /// Display or guard name; canonicalized before lookup.
    Name(String),
    Id(I),
    Names(Vec<String>),
    Ids(Vec<I>),
}

pub type RoleRef = EntityRef<RoleId>;
pub type PermissionRef = EntityRef<PermissionId>;

/// Normalized batch request handed to the repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<I> {
    Ids(Vec<I>),
    GuardNames(Vec<GuardName>),
}

impl<I> Lookup<I> {
    /// Number of distinct keys requested.
    pub fn len(&self) -> usize {
        match self {
            Lookup::Ids(ids) => ids.len(),
            Lookup::GuardNames(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<I: core::fmt::Display> core::fmt::Display for Lookup<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let keys: Vec<String> = match self {
            Lookup::Ids(ids) => ids.iter().map(ToString::to_string).collect(),
            Lookup::GuardNames(names) => names.iter().map(ToString::to_string).collect(),
        };
        f.write_str(&keys.join(", "))
    }
}

impl<I> EntityRef<I>
where
    I: Copy + Eq + std::hash::Hash,
{
    pub fn is_plural(&self) -> bool {
        matches!(self, EntityRef::Names(_) | EntityRef::Ids(_))
    }

    /// Normalize into a deduplicated batch; a single key becomes a one-element
    /// batch.
    pub fn lookup(&self) -> Lookup<I> {
        match self {
            EntityRef::Name(name) => Lookup::GuardNames(vec![GuardName::from_display(name)]),
            EntityRef::Id(id) => Lookup::Ids(vec![*id]),
            EntityRef::Names(names) => {
                let mut seen = HashSet::new();
                Lookup::GuardNames(
                    names
                        .iter()
                        .map(|n| GuardName::from_display(n))
                        .filter(|g| seen.insert(g.clone()))
                        .collect(),
                )
            }
            EntityRef::Ids(ids) => Lookup::Ids(dedup_ids(ids.iter().copied())),
        }
    }
}

impl<I> EntityRef<I> {
    fn from_items(items: &[Value]) -> Result<Self, AccessError>
    where
        I: From<u64>,
    {
        let Some(first) = items.first() else {
            return Ok(EntityRef::Ids(Vec::new()));
        };

        match first {
            Value::String(_) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(mixed(idx, "name", other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(EntityRef::Names),
            Value::Number(_) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| match item.as_u64() {
                    Some(id) => Ok(I::from(id)),
                    None => Err(mixed(idx, "id", item)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(EntityRef::Ids),
            other => Err(AccessError::unsupported(format!(
                "list of {} is not a list of names or ids",
                kind(other)
            ))),
        }
    }
}

/// Conversion used by binding layers that receive untyped input.
impl<I: From<u64>> TryFrom<&Value> for EntityRef<I> {
    type Error = AccessError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(name) => Ok(EntityRef::Name(name.clone())),
            Value::Number(n) => n
                .as_u64()
                .map(|id| EntityRef::Id(I::from(id)))
                .ok_or_else(|| AccessError::unsupported(format!("{n} is not a non-negative integer id"))),
            Value::Array(items) => Self::from_items(items),
            other => Err(AccessError::unsupported(format!("{} is not a name or id", kind(other)))),
        }
    }
}

fn mixed(idx: usize, expected: &str, found: &Value) -> AccessError {
    AccessError::unsupported(format!(
        "mixed list: element {idx} is {} but the list holds {expected}s",
        kind(found)
    ))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(n) if n.is_i64() => "a negative integer",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "a nested list",
        Value::Object(_) => "an object",
    }
}

impl<I> From<&str> for EntityRef<I> {
    fn from(name: &str) -> Self {
        EntityRef::Name(name.to_string())
    }
}

impl<I> From<String> for EntityRef<I> {
    fn from(name: String) -> Self {
        EntityRef::Name(name)
    }
}

impl<I> From<Vec<String>> for EntityRef<I> {
    fn from(names: Vec<String>) -> Self {
        EntityRef::Names(names)
    }
}

impl<I> From<Vec<&str>> for EntityRef<I> {
    fn from(names: Vec<&str>) -> Self {
        EntityRef::Names(names.into_iter().map(str::to_string).collect())
    }
}

impl<I> From<&[&str]> for EntityRef<I> {
    fn from(names: &[&str]) -> Self {
        EntityRef::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<I, const N: usize> From<[&str; N]> for EntityRef<I> {
    fn from(names: [&str; N]) -> Self {
        EntityRef::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

macro_rules! impl_id_refs {
    ($id:ty) => {
        impl From<$id> for EntityRef<$id> {
            fn from(id: $id) -> Self {
                EntityRef::Id(id)
            }
        }

        impl From<u64> for EntityRef<$id> {
            fn from(id: u64) -> Self {
                EntityRef::Id(<$id>::new(id))
            }
        }

        impl From<Vec<$id>> for EntityRef<$id> {
            fn from(ids: Vec<$id>) -> Self {
                EntityRef::Ids(ids)
            }
        }

        impl From<&[$id]> for EntityRef<$id> {
            fn from(ids: &[$id]) -> Self {
                EntityRef::Ids(ids.to_vec())
            }
        }

        impl From<Vec<u64>> for EntityRef<$id> {
            fn from(ids: Vec<u64>) -> Self {
                EntityRef::Ids(ids.into_iter().map(<$id>::new).collect())
            }
        }

        impl<const N: usize> From<[u64; N]> for EntityRef<$id> {
            fn from(ids: [u64; N]) -> Self {
                EntityRef::Ids(ids.into_iter().map(<$id>::new).collect())
            }
        }
    };
}

impl_id_refs!(RoleId);
impl_id_refs!(PermissionId);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_are_canonicalized_and_deduplicated() {
        let r: PermissionRef = vec!["Delete User", "delete-user", "Edit Post"].into();
        assert_eq!(
            r.lookup(),
            Lookup::GuardNames(vec![
                GuardName::from_display("delete-user"),
                GuardName::from_display("edit-post"),
            ])
        );
    }

    #[test]
    fn single_values_become_one_element_batches() {
        let r: RoleRef = 7u64.into();
        assert!(!r.is_plural());
        assert_eq!(r.lookup(), Lookup::Ids(vec![RoleId::new(7)]));

        let r: RoleRef = "Admin".into();
        assert_eq!(r.lookup(), Lookup::GuardNames(vec![GuardName::from_display("admin")]));
    }

    #[test]
    fn id_lists_are_deduplicated_in_order() {
        let r: RoleRef = [3u64, 1, 3].into();
        assert!(r.is_plural());
        assert_eq!(r.lookup(), Lookup::Ids(vec![RoleId::new(3), RoleId::new(1)]));
        assert_eq!(r.lookup().len(), 2);
    }

    #[test]
    fn json_values_map_onto_variants() {
        assert_eq!(RoleRef::try_from(&json!("admin")).unwrap(), EntityRef::Name("admin".into()));
        assert_eq!(RoleRef::try_from(&json!(4)).unwrap(), EntityRef::Id(RoleId::new(4)));
        assert_eq!(
            RoleRef::try_from(&json!(["a", "b"])).unwrap(),
            EntityRef::Names(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            RoleRef::try_from(&json!([1, 2])).unwrap(),
            EntityRef::Ids(vec![RoleId::new(1), RoleId::new(2)])
        );
        assert!(RoleRef::try_from(&json!([])).unwrap().lookup().is_empty());
    }

    #[test]
    fn mixed_lists_are_rejected() {
        let err = PermissionRef::try_from(&json!(["admin", 3])).unwrap_err();
        assert!(matches!(err, AccessError::UnsupportedInputKind(msg) if msg.contains("element 1")));

        let err = PermissionRef::try_from(&json!([3, "admin"])).unwrap_err();
        assert!(matches!(err, AccessError::UnsupportedInputKind(_)));
    }

    #[test]
    fn other_shapes_are_rejected() {
        for value in [json!(true), json!(1.5), json!(-3), json!(null), json!({"id": 1}), json!([[1]])] {
            let err = RoleRef::try_from(&value).unwrap_err();
            assert!(matches!(err, AccessError::UnsupportedInputKind(_)), "{value} accepted");
        }
    }
}
