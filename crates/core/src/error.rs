//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only deterministic business outcomes of the reception lifecycle live here.
/// Storage, connectivity and decoding failures belong to the infrastructure
/// layer and are never folded into these kinds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A pickup point was requested for a city outside the allow-list.
    #[error("city not allowed: {0}")]
    CityNotAllowed(String),

    /// The pickup point already has a reception in progress.
    #[error("active reception already exists")]
    ActiveReceptionExists,

    /// The pickup point has no reception in progress.
    #[error("no active reception found")]
    NoOpenReception,

    /// The open reception holds no products.
    #[error("no products to delete in active reception")]
    NoProductsToRemove,

    /// Product type outside the recognized set.
    #[error("invalid product type: {0}")]
    InvalidType(String),
}

impl DomainError {
    pub fn city_not_allowed(city: impl Into<String>) -> Self {
        Self::CityNotAllowed(city.into())
    }

    pub fn invalid_type(value: impl Into<String>) -> Self {
        Self::InvalidType(value.into())
    }
}
