use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{Entity, GuardName, RoleId};

use crate::Permission;

/// Stored role.
///
/// `permissions` is only populated when the role was fetched with
/// permissions preloaded; otherwise it is empty and says nothing about the
/// role's actual grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub guard_name: GuardName,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Role {
    type Id = RoleId;

    const KIND: &'static str = "role";

    fn id(&self) -> RoleId {
        self.id
    }

    fn guard_name(&self) -> &GuardName {
        &self.guard_name
    }
}

/// Role that has not been stored yet (input to find-or-create).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub guard_name: GuardName,
    pub description: Option<String>,
}

impl NewRole {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let name = name.into();
        Self {
            guard_name: GuardName::from_display(&name),
            name,
            description,
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.guard_name.as_str())
    }
}
