use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{Entity, GuardName, PermissionId};

/// Stored permission.
///
/// `guard_name` is the canonical form of `name` and is unique across all
/// permissions; every name-based lookup goes through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub guard_name: GuardName,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Permission {
    type Id = PermissionId;

    const KIND: &'static str = "permission";

    fn id(&self) -> PermissionId {
        self.id
    }

    fn guard_name(&self) -> &GuardName {
        &self.guard_name
    }
}

/// Permission that has not been stored yet (input to find-or-create).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub guard_name: GuardName,
    pub description: Option<String>,
}

impl NewPermission {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let name = name.into();
        Self {
            guard_name: GuardName::from_display(&name),
            name,
            description,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.guard_name.as_str())
    }
}
