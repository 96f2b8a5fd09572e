//! The four lifecycle components, each a thin async service over one storage
//! seam.
//!
//! Every operation is cancel-safe: dropping its future aborts the in-flight
//! store call and any open transaction rolls back.

pub mod listing;
pub mod pickup_points;
pub mod products;
pub mod receptions;

use std::future::Future;
use std::time::Duration;

use pvz_receiving::{CityAllowList, PaginationPolicy};

use crate::config::PvzConfig;
use crate::error::{ServiceError, StoreError};
use crate::store::{ListingSource, PickupPointStore, ProductStore, ReceptionStore};

pub use listing::ListingAggregator;
pub use pickup_points::PickupPointRegistry;
pub use products::ProductLedger;
pub use receptions::ReceptionLifecycle;

/// All four components wired over one shared store handle (typically an
/// `Arc` of a store).
#[derive(Debug, Clone)]
pub struct PvzServices<S> {
    pub pickup_points: PickupPointRegistry<S>,
    pub receptions: ReceptionLifecycle<S>,
    pub products: ProductLedger<S>,
    pub listing: ListingAggregator<S>,
}

impl<S> PvzServices<S>
where
    S: Clone + PickupPointStore + ReceptionStore + ProductStore + ListingSource,
{
    pub fn new(store: S, allowed_cities: CityAllowList, pagination: PaginationPolicy) -> Self {
        Self {
            pickup_points: PickupPointRegistry::new(store.clone(), allowed_cities),
            receptions: ReceptionLifecycle::new(store.clone()),
            products: ProductLedger::new(store.clone()),
            listing: ListingAggregator::new(store, pagination),
        }
    }

    pub fn from_config(store: S, config: &PvzConfig) -> Self {
        Self::new(store, config.allowed_cities.clone(), config.pagination)
    }
}

/// Run `operation` with an upper bound on its duration.
///
/// On expiry the operation future is dropped, which aborts its store call
/// without committing anything.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?deadline, "operation exceeded deadline");
            Err(ServiceError::Store(StoreError::Timeout(deadline)))
        }
    }
}

/// Business rejections are expected traffic; infrastructure failures are not.
fn log_failure(err: &ServiceError) {
    match err {
        ServiceError::Domain(e) => tracing::warn!(error = %e, "operation rejected"),
        ServiceError::Store(e) => tracing::error!(error = %e, "store failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::DatabaseConfig;
    use crate::store::InMemoryPvzStore;

    #[tokio::test]
    async fn bundle_wires_every_component_to_one_store() {
        let config = PvzConfig {
            database: DatabaseConfig {
                url: "postgres://unused".to_string(),
                max_connections: 1,
                acquire_timeout: Duration::from_secs(1),
            },
            allowed_cities: CityAllowList::new(["Тверь"]),
            pagination: PaginationPolicy::default(),
        };
        let store = Arc::new(InMemoryPvzStore::new());
        let services = PvzServices::from_config(store.clone(), &config);

        let pp = services.pickup_points.create_pickup_point("Тверь").await.unwrap();
        let reception = services.receptions.open_reception(pp.id).await.unwrap();
        services.products.add_product(pp.id, "обувь").await.unwrap();

        assert_eq!(store.products_of(reception.id).unwrap().len(), 1);
        let listing = services.listing.list_pickup_points(None, None, 1, 10).await.unwrap();
        assert_eq!(listing[0].pickup_point.id, pp.id);
    }

    #[tokio::test]
    async fn deadline_expiry_is_reported_as_timeout() {
        let result: Result<(), ServiceError> =
            with_deadline(Duration::from_millis(10), std::future::pending()).await;
        assert!(matches!(
            result,
            Err(ServiceError::Store(StoreError::Timeout(d))) if d == Duration::from_millis(10)
        ));
    }

    #[tokio::test]
    async fn completed_operations_pass_through() {
        let result = with_deadline(Duration::from_secs(1), async { Ok::<_, ServiceError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
