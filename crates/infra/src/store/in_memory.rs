use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use pvz_core::{DomainError, PickupPointId, ReceptionId};
use pvz_receiving::{
    ListingParams, ListingRow, NewPickupPoint, NewProduct, NewReception, PickupPoint, Product,
    Reception, ReceptionStatus,
};

use super::{ListingSource, PickupPointStore, ProductStore, ReceptionStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct State {
    pickup_points: Vec<PickupPoint>,
    receptions: Vec<Reception>,
    /// Insertion order doubles as the tie-break for equal `added_at`.
    products: Vec<Product>,
    last_stamp: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing timestamps, at the microsecond resolution Postgres keeps.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    fn open_reception_index(&self, pickup_point_id: PickupPointId) -> Option<usize> {
        self.receptions
            .iter()
            .position(|r| r.pickup_point_id == pickup_point_id && r.is_open())
    }
}

/// In-memory store for tests/dev.
///
/// A single lock guards all three tables, so each trait method is atomic
/// with respect to every other call.
#[derive(Debug, Default)]
pub struct InMemoryPvzStore {
    state: RwLock<State>,
}

impl InMemoryPvzStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }

    /// All receptions ever opened at a pickup point, oldest first.
    pub fn receptions_of(&self, pickup_point_id: PickupPointId) -> Result<Vec<Reception>, StoreError> {
        Ok(self
            .read()?
            .receptions
            .iter()
            .filter(|r| r.pickup_point_id == pickup_point_id)
            .cloned()
            .collect())
    }

    /// Products currently owned by a reception, in insertion order.
    pub fn products_of(&self, reception_id: ReceptionId) -> Result<Vec<Product>, StoreError> {
        Ok(self
            .read()?
            .products
            .iter()
            .filter(|p| p.reception_id == reception_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PickupPointStore for InMemoryPvzStore {
    async fn insert_pickup_point(&self, new: NewPickupPoint) -> Result<PickupPoint, StoreError> {
        let mut state = self.write()?;
        let pickup_point = PickupPoint {
            id: new.id,
            city: new.city,
            registered_at: state.stamp(),
        };
        state.pickup_points.push(pickup_point.clone());
        Ok(pickup_point)
    }
}

#[async_trait]
impl ReceptionStore for InMemoryPvzStore {
    async fn open_reception(&self, new: NewReception) -> Result<Reception, StoreError> {
        let mut state = self.write()?;

        if !state.pickup_points.iter().any(|pp| pp.id == new.pickup_point_id) {
            return Err(StoreError::MissingPickupPoint(new.pickup_point_id));
        }
        if state.open_reception_index(new.pickup_point_id).is_some() {
            return Err(DomainError::ActiveReceptionExists.into());
        }

        let reception = Reception {
            id: new.id,
            pickup_point_id: new.pickup_point_id,
            opened_at: state.stamp(),
            status: ReceptionStatus::InProgress,
        };
        state.receptions.push(reception.clone());
        Ok(reception)
    }

    async fn close_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Reception, StoreError> {
        let mut state = self.write()?;
        let idx = state
            .open_reception_index(pickup_point_id)
            .ok_or(DomainError::NoOpenReception)?;

        let closed = state.receptions[idx].close()?;
        state.receptions[idx] = closed.clone();
        Ok(closed)
    }

    async fn find_open_reception(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Option<Reception>, StoreError> {
        let state = self.read()?;
        Ok(state
            .open_reception_index(pickup_point_id)
            .map(|idx| state.receptions[idx].clone()))
    }
}

#[async_trait]
impl ProductStore for InMemoryPvzStore {
    async fn append_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        let mut state = self.write()?;
        let idx = state
            .open_reception_index(new.pickup_point_id)
            .ok_or(DomainError::NoOpenReception)?;

        let product = Product {
            id: new.id,
            reception_id: state.receptions[idx].id,
            product_type: new.product_type,
            added_at: state.stamp(),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn remove_last_product(
        &self,
        pickup_point_id: PickupPointId,
    ) -> Result<Product, StoreError> {
        let mut state = self.write()?;
        let reception_id = state
            .open_reception_index(pickup_point_id)
            .map(|idx| state.receptions[idx].id)
            .ok_or(DomainError::NoOpenReception)?;

        let (idx, _) = state
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| p.reception_id == reception_id)
            .max_by_key(|(i, p)| (p.added_at, *i))
            .ok_or(DomainError::NoProductsToRemove)?;

        Ok(state.products.remove(idx))
    }
}

#[async_trait]
impl ListingSource for InMemoryPvzStore {
    async fn fetch_listing_rows(&self, params: &ListingParams) -> Result<Vec<ListingRow>, StoreError> {
        let state = self.read()?;

        let has_products = |r: &Reception| state.products.iter().any(|p| p.reception_id == r.id);
        let contributes = |r: &Reception| params.covers(r.opened_at) && has_products(r);

        let mut pickup_points: Vec<&PickupPoint> = state
            .pickup_points
            .iter()
            .filter(|pp| {
                state
                    .receptions
                    .iter()
                    .any(|r| r.pickup_point_id == pp.id && contributes(r))
            })
            .collect();
        pickup_points.sort_by(|a, b| {
            b.registered_at
                .cmp(&a.registered_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = usize::try_from(params.offset()).unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for pickup_point in pickup_points.into_iter().skip(offset).take(params.limit as usize) {
            let mut receptions: Vec<&Reception> = state
                .receptions
                .iter()
                .filter(|r| r.pickup_point_id == pickup_point.id && params.covers(r.opened_at))
                .collect();
            receptions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.id.cmp(&b.id)));

            for reception in receptions {
                for product in state.products.iter().filter(|p| p.reception_id == reception.id) {
                    rows.push(ListingRow {
                        pickup_point: pickup_point.clone(),
                        reception: reception.clone(),
                        product: product.clone(),
                    });
                }
            }
        }

        Ok(rows)
    }
}
