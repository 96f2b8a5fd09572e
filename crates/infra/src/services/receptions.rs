use tracing::{info, instrument};

use pvz_core::PickupPointId;
use pvz_receiving::{NewReception, Reception};

use super::log_failure;
use crate::error::ServiceError;
use crate::store::ReceptionStore;

/// Per pickup point state machine: no open reception ⇄ open.
///
/// Exclusivity is enforced by the store's conditional insert, never by a
/// read here followed by a write.
#[derive(Debug, Clone)]
pub struct ReceptionLifecycle<S> {
    store: S,
}

impl<S: ReceptionStore> ReceptionLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fails with `ActiveReceptionExists` if one is already in progress,
    /// including when a concurrent caller won the race.
    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id))]
    pub async fn open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ServiceError> {
        let reception = self
            .store
            .open_reception(NewReception::for_pickup_point(pickup_point_id))
            .await
            .map_err(ServiceError::from)
            .inspect_err(log_failure)?;

        info!(reception_id = %reception.id, "reception opened");
        Ok(reception)
    }

    /// Fails with `NoOpenReception` if nothing is in progress.
    #[instrument(skip(self), fields(pickup_point_id = %pickup_point_id))]
    pub async fn close_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, ServiceError> {
        let reception = self
            .store
            .close_open_reception(pickup_point_id)
            .await
            .map_err(ServiceError::from)
            .inspect_err(log_failure)?;

        info!(reception_id = %reception.id, "reception closed");
        Ok(reception)
    }

    /// The reception currently addressable at the pickup point, if any.
    pub async fn current_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, ServiceError> {
        Ok(self.store.find_open_reception(pickup_point_id).await?)
    }
}
