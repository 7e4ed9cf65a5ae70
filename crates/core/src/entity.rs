//! Entity trait: stored rows with a storage-assigned identity.

/// Stored entity addressable both by id and by guard name.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Entity label used in `NotFound` errors and log fields.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    fn guard_name(&self) -> &crate::GuardName;
}
