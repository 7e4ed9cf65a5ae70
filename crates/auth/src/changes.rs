//! Partial updates for roles and permissions.

use rolegate_core::GuardName;

/// Field changes applied by `update`.
///
/// Only fields set to `Some` are written. Renaming also rewrites the guard
/// name so the canonical key never drifts from the display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changes {
    pub name: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
}

impl Changes {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn describe(description: Option<String>) -> Self {
        Self {
            description: Some(description),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }

    /// Guard name implied by a rename, if any.
    pub fn guard_name(&self) -> Option<GuardName> {
        self.name.as_deref().map(GuardName::from_display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_carries_canonical_guard_name() {
        let changes = Changes::rename("Billing Admin");
        assert_eq!(changes.guard_name().unwrap().as_str(), "billing-admin");
        assert!(!changes.is_empty());
    }

    #[test]
    fn description_only_change_keeps_guard_name() {
        let changes = Changes::describe(Some("reads invoices".to_string()));
        assert!(changes.guard_name().is_none());
        assert!(Changes::default().is_empty());
    }
}
