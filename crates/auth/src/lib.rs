//! `rolegate-auth` — roles, permissions and the resolution engine.
//!
//! This crate holds no storage code of its own: it defines the
//! repository traits and ships an in-memory implementation, while SQL
//! implementations live in `rolegate-infra`.

pub mod access;
pub mod changes;
pub mod collections;
pub mod in_memory;
pub mod lookup;
pub mod options;
pub mod permissions;
pub mod repository;
pub mod roles;

pub use access::AccessControl;
pub use changes::Changes;
pub use collections::{PermissionCollection, RoleCollection};
pub use in_memory::InMemoryRbacStore;
pub use lookup::{EntityRef, Lookup, PermissionRef, RoleRef};
pub use options::{PermissionQuery, RoleQuery};
pub use permissions::{NewPermission, Permission};
pub use repository::{PermissionRepository, RoleRepository, UserRepository};
pub use roles::{NewRole, Role};
