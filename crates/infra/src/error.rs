//! Infrastructure error model.
//!
//! Stores report business outcomes they enforce (the conditional insert that
//! loses a race, the remove that finds nothing) as `StoreError::Rejected`;
//! every other variant is an opaque infrastructure failure.

use std::time::Duration;

use thiserror::Error;

use pvz_core::{DomainError, PickupPointId};

/// Store operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A lifecycle rule enforced atomically by the store.
    #[error(transparent)]
    Rejected(#[from] DomainError),

    /// Database failure; the driver error is kept unchanged.
    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Referential integrity violation: the pickup point does not exist.
    #[error("pickup point not found: {0}")]
    MissingPickupPoint(PickupPointId),

    /// A stored row could not be turned back into a domain value.
    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("store call exceeded deadline of {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    pub fn database(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Database { operation, source }
    }
}

/// Error returned by the lifecycle services.
///
/// Callers match `Domain` for the five business kinds; `Store` carries
/// everything else untouched.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    /// The business kind, if this is one.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            ServiceError::Store(_) => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(domain) => ServiceError::Domain(domain),
            other => ServiceError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_store_errors_surface_as_domain_kinds() {
        let err: ServiceError = StoreError::Rejected(DomainError::ActiveReceptionExists).into();
        assert_eq!(err.domain(), Some(&DomainError::ActiveReceptionExists));
    }

    #[test]
    fn infrastructure_failures_stay_opaque() {
        let err: ServiceError = StoreError::database("open_reception", sqlx::Error::PoolClosed).into();
        assert!(err.domain().is_none());
        assert!(matches!(
            err,
            ServiceError::Store(StoreError::Database {
                operation: "open_reception",
                source: sqlx::Error::PoolClosed
            })
        ));
    }

    #[test]
    fn missing_pickup_point_is_not_a_domain_kind() {
        let err: ServiceError = StoreError::MissingPickupPoint(PickupPointId::new()).into();
        assert!(err.domain().is_none());
    }
}
