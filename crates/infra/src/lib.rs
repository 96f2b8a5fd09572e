//! Infrastructure layer: storage, configuration and the lifecycle services
//! for pickup points, receptions and products.

pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod store;


pub use config::{DatabaseConfig, PvzConfig};
pub use error::{ServiceError, StoreError};
pub use services::{
    with_deadline, ListingAggregator, PickupPointRegistry, ProductLedger, PvzServices,
    ReceptionLifecycle,
};
pub use store::{
    InMemoryPvzStore, ListingSource, PickupPointStore, PostgresPvzStore, ProductStore,
    ReceptionStore,
};
