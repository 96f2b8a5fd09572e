//! Receiving domain module.
//!
//! Business rules for pickup points, their receptions and the products scanned
//! into them, implemented purely as deterministic domain logic (no IO, no
//! storage). Storage-level atomicity lives in `pvz-infra`.

pub mod listing;
pub mod pickup_point;
pub mod product;
pub mod reception;

pub use listing::{
    group_listing_rows, ListingParams, ListingRow, PaginationError, PaginationPolicy,
    PickupPointListing, ReceptionWithProducts,
};
pub use pickup_point::{CityAllowList, NewPickupPoint, PickupPoint};
pub use product::{NewProduct, Product, ProductType};
pub use reception::{NewReception, Reception, ReceptionStatus};
