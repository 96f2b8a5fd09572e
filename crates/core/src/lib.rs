//! `pvz-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers and the business error taxonomy shared by the pickup point,
//! reception and product lifecycle.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{PickupPointId, ProductId, ReceptionId};
