//! Strongly-typed numeric identifiers.
//!
//! Roles and permissions get their ids from storage; users are external and
//! only ever appear as an id.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// Identifier of a user (external principal).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

/// Identifier of a stored role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(u64);

/// Identifier of a stored permission.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(u64);

macro_rules! impl_numeric_id {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }

            /// Signed view used by storage drivers whose integer columns are `i64`.
            pub fn to_i64(self) -> i64 {
                self.0 as i64
            }

            /// Rebuild an id read back from an `i64` storage column.
            pub fn from_i64(value: i64) -> Self {
                Self(value as u64)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = AccessError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = u64::from_str(s.trim())
                    .map_err(|e| AccessError::unsupported(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_numeric_id!(UserId, "UserId");
impl_numeric_id!(RoleId, "RoleId");
impl_numeric_id!(PermissionId, "PermissionId");
