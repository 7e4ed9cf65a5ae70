//! `rolegate-core` — building blocks shared by the access-control crates.
//!
//! Identifiers, the error model, canonical naming and pagination. No storage
//! and no IO.

pub mod entity;
pub mod error;
pub mod guard;
pub mod id;
pub mod pagination;
pub mod value_object;

pub use entity::Entity;
pub use error::{AccessError, AccessResult};
pub use guard::{canonicalize, GuardName};
pub use id::{PermissionId, RoleId, UserId};
pub use pagination::{IdPage, PageDefaults, PageRequest, Paged, Pagination};
pub use value_object::ValueObject;
