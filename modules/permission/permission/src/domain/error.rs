use std::time::Duration;

use permission_sdk::PermissionError;
use tx_context::TxError;
use uuid::Uuid;

use crate::domain::repos::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error(
        "identity with ID {identity_id} does not have required scope {scope} for resource {resource_id}"
    )]
    Forbidden {
        identity_id: Uuid,
        resource_id: String,
        scope: String,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Transaction timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
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

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
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
}

impl From<TxError<DomainError>> for DomainError {
    fn from(e: TxError<DomainError>) -> Self {
        e.into_domain_with(|infra| match infra {
            TxError::Timeout(after) => Self::Timeout(after),
            other => Self::Internal(other.to_string()),
        })
    }
}

impl From<DomainError> for PermissionError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Forbidden {
                identity_id,
                resource_id,
                scope,
            } => Self::forbidden(identity_id, resource_id, scope),
            DomainError::NotFound { entity, id } => Self::not_found(entity, id),
            DomainError::Validation { field, message } => Self::validation(field, message),
            DomainError::Timeout(_) => Self::Timeout,
            DomainError::Repository(e) => Self::internal(e.to_string()),
            DomainError::Internal(message) => Self::Internal(message),
        }
    }
}
