//! Listing options for the façade.

use rolegate_core::PageRequest;

/// Options when listing roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleQuery {
    /// Preload each role's permission set.
    pub with_permissions: bool,
    /// `None` lists everything.
    pub page: Option<PageRequest>,
}

impl RoleQuery {
    pub fn with_permissions(mut self) -> Self {
        self.with_permissions = true;
        self
    }

    pub fn paged(mut self, page: i64, limit: i64) -> Self {
        self.page = Some(PageRequest::new(page, limit));
        self
    }
}

/// Options when listing permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionQuery {
    /// `None` lists everything.
    pub page: Option<PageRequest>,
}

impl PermissionQuery {
    pub fn paged(page: i64, limit: i64) -> Self {
        Self {
            page: Some(PageRequest::new(page, limit)),
        }
    }
}
