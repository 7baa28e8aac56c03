//! Error types for the permission module.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`PermissionClient`](crate::PermissionClient).
///
/// `Forbidden` is a decision; `Internal` and `Timeout` mean no decision could
/// be made and must never be read as "denied".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error(
        "identity with ID {identity_id} does not have required scope {scope} for resource {resource_id}"
    )]
    Forbidden {
        identity_id: Uuid,
        resource_id: String,
        scope: String,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("permission check timed out")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PermissionError {
    pub fn forbidden(
        identity_id: Uuid,
        resource_id: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self::Forbidden {
            identity_id,
            resource_id: resource_id.into(),
            scope: scope.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}
