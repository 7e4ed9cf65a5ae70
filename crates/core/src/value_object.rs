//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two instances with the same contents are
/// interchangeable. Guard names are the main example here, two guard names are
/// the same key exactly when their strings match.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
