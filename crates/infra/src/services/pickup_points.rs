use tracing::{info, instrument};

use pvz_receiving::{CityAllowList, PickupPoint};

use super::log_failure;
use crate::error::ServiceError;
use crate::store::PickupPointStore;

/// Pickup point store: registration subject to the city allow-list.
#[derive(Debug, Clone)]
pub struct PickupPointRegistry<S> {
    store: S,
    allowed_cities: CityAllowList,
}

impl<S: PickupPointStore> PickupPointRegistry<S> {
    pub fn new(store: S, allowed_cities: CityAllowList) -> Self {
        Self {
            store,
            allowed_cities,
        }
    }

    /// Fails with `CityNotAllowed` before touching storage.
    #[instrument(skip(self))]
    pub async fn create_pickup_point(&self, city: &str) -> Result<PickupPoint, ServiceError> {
        let result = async {
            let new = self.allowed_cities.admit(city)?;
            Ok::<_, ServiceError>(self.store.insert_pickup_point(new).await?)
        }
        .await
        .inspect_err(log_failure);

        if let Ok(pickup_point) = &result {
            info!(pickup_point_id = %pickup_point.id, "pickup point registered");
        }
        result
    }
}
