use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use pvz_receiving::{group_listing_rows, ListingParams, PaginationPolicy, PickupPointListing};

use super::log_failure;
use crate::error::ServiceError;
use crate::store::ListingSource;

/// Read-only nested view over pickup points, receptions and products.
#[derive(Debug, Clone)]
pub struct ListingAggregator<S> {
    store: S,
    pagination: PaginationPolicy,
}

impl<S: ListingSource> ListingAggregator<S> {
    pub fn new(store: S, pagination: PaginationPolicy) -> Self {
        Self { store, pagination }
    }

    /// Raw caller input; page and limit are normalized by the injected
    /// pagination policy. Pages past the end are empty, not errors.
    pub async fn list_pickup_points(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page: i64,
        limit: i64,
    ) -> Result<Vec<PickupPointListing>, ServiceError> {
        let params = ListingParams::new(start, end, page, limit, &self.pagination);
        self.list(&params).await
    }

    #[instrument(skip(self), fields(page = params.page, limit = params.limit))]
    pub async fn list(&self, params: &ListingParams) -> Result<Vec<PickupPointListing>, ServiceError> {
        let rows = self
            .store
            .fetch_listing_rows(params)
            .await
            .map_err(ServiceError::from)
            .inspect_err(log_failure)?;

        let row_count = rows.len();
        let listings = group_listing_rows(rows);
        debug!(row_count, pickup_points = listings.len(), "listing assembled");
        Ok(listings)
    }
}
