//! Authorization errors.

use crate::store::StoreError;

use super::types::{Action, Resource};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The caller may not perform `action` on `resource`.
    #[error("permission denied: {action} on {resource}")]
    PermissionDenied { resource: Resource, action: Action },

    /// Lookup failure, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthzError {
    pub fn denied(resource: Resource, action: Action) -> Self {
        Self::PermissionDenied { resource, action }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_display_names_the_pair() {
        let err = AuthzError::denied(Resource::ApiKey, Action::Delete);
        assert!(err.is_denied());
        assert_eq!(err.to_string(), "permission denied: delete on api_key");
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err = AuthzError::from(StoreError::Unavailable("pool timed out".to_string()));
        assert!(!err.is_denied());
        assert!(err.to_string().contains("pool timed out"));
    }
}
