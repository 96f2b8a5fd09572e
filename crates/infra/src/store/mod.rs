//! Storage boundary for pickup points, receptions and products.
//!
//! Every operation that must be atomic (open-if-none-open, append-to-open,
//! remove-newest) is a single trait method, so implementations push the
//! check and the write into one storage-level step instead of leaving the
//! caller to compose a read with a write.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use pvz_core::PickupPointId;
use pvz_receiving::{
    ListingParams, ListingRow, NewPickupPoint, NewProduct, NewReception, PickupPoint, Product,
    Reception,
};

use crate::error::StoreError;

pub use in_memory::InMemoryPvzStore;
pub use postgres::PostgresPvzStore;

#[async_trait]
pub trait PickupPointStore: Send + Sync {
    /// Persist a pickup point; the store assigns `registered_at`.
    async fn insert_pickup_point(&self, new: NewPickupPoint) -> Result<PickupPoint, StoreError>;
}

#[async_trait]
pub trait ReceptionStore: Send + Sync {
    /// Create an in-progress reception unless one is already open for the
    /// pickup point (`Rejected(ActiveReceptionExists)`).
    ///
    /// Two concurrent calls for the same pickup point never both succeed.
    async fn open_reception(&self, new: NewReception) -> Result<Reception, StoreError>;

    /// Close the single open reception (`Rejected(NoOpenReception)` if none).
    async fn close_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, StoreError>;

    async fn find_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Append a product to the open reception of `new.pickup_point_id`
    /// (`Rejected(NoOpenReception)` if none). The reception cannot be closed
    /// between the lookup and the insert.
    async fn append_product(&self, new: NewProduct) -> Result<Product, StoreError>;

    /// Delete and return the newest product of the open reception, as one
    /// atomic unit. Newest means greatest `added_at`, ties broken by insertion
    /// order.
    async fn remove_last_product(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Product, StoreError>;
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Flattened join rows for one page of pickup points.
    ///
    /// Only receptions inside the date bounds that own at least one product
    /// contribute rows. Pickup points are paged by `registered_at` descending;
    /// rows of one pickup point are contiguous, receptions ordered by
    /// `opened_at`, products by insertion.
    async fn fetch_listing_rows(&self, params: &ListingParams) -> Result<Vec<ListingRow>, StoreError>;
}

#[async_trait]
impl<S> PickupPointStore for Arc<S>
where
    S: PickupPointStore + ?Sized,
{
    async fn insert_pickup_point(&self, new: NewPickupPoint) -> Result<PickupPoint, StoreError> {
        (**self).insert_pickup_point(new).await
    }
}

#[async_trait]
impl<S> ReceptionStore for Arc<S>
where
    S: ReceptionStore + ?Sized,
{
    async fn open_reception(&self, new: NewReception) -> Result<Reception, StoreError> {
        (**self).open_reception(new).await
    }

    async fn close_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, StoreError> {
        (**self).close_open_reception(pickup_point_id).await
    }

    async fn find_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        (**self).find_open_reception(pickup_point_id).await
    }
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn append_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        (**self).append_product(new).await
    }

    async fn remove_last_product(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Product, StoreError> {
        (**self).remove_last_product(pickup_point_id).await
    }
}

#[async_trait]
impl<S> ListingSource for Arc<S>
where
    S: ListingSource + ?Sized,
{
    async fn fetch_listing_rows(&self, params: &ListingParams) -> Result<Vec<ListingRow>, StoreError> {
        (**self).fetch_listing_rows(params).await
    }
}
