use tracing::{info, instrument};

use pvz_core::PickupPointId;
use pvz_receiving::{NewProduct, Product, ProductType};

use super::log_failure;
use crate::error::ServiceError;
use crate::store::ProductStore;

/// Product ledger: append to the open reception, remove last-in-first-out.
#[derive(Debug, Clone)]
pub struct ProductLedger<S> {
    store: S,
}

impl<S: ProductStore> ProductLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `product_type` is validated before any storage access, so an
    /// `InvalidType` failure never creates a row.
    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id))]
    pub async fn add_product(
        &self,
        pickup_point_id: PickupPointId,
        product_type: &str,
    ) -> Result<Product, ServiceError> {
        let result = async {
            let product_type: ProductType = product_type.parse()?;
            let new = NewProduct::for_pickup_point(pickup_point_id, product_type);
            Ok::<_, ServiceError>(self.store.append_product(new).await?)
        }
        .await
        .inspect_err(log_failure);

        if let Ok(product) = &result {
            info!(
                product_id = %product.id,
                reception_id = %product.reception_id,
                "product added"
            );
        }
        result
    }

    /// Removes and returns the most recently added product of the open
    /// reception.
    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id))]
    pub async fn remove_last_product(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Product, ServiceError> {
        let product = self
            .store
            .remove_last_product(pickup_point_id)
            .await
            .map_err(ServiceError::from)
            .inspect_err(log_failure)?;

        info!(product_id = %product.id, "last product removed");
        Ok(product)
    }
}
