//! Read model for the pickup point listing.
//!
//! Storage hands back a flat stream of (pickup point × reception × product)
//! join rows; this module turns it into the nested
//! `pickup point → receptions → products` tree.
//!
//! Only receptions that own at least one product ever produce a row, so a
//! pickup point whose receptions are all empty (or all outside the date
//! range) never shows up in a listing. This filtering is intentional.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pvz_core::{PickupPointId, ReceptionId};

use crate::pickup_point::PickupPoint;
use crate::product::Product;
use crate::reception::Reception;

/// Invalid page size bounds.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("default page limit {default_limit} must be within 1..={max_limit}")]
pub struct PaginationError {
    pub default_limit: u32,
    pub max_limit: u32,
}

/// Page size bounds, injected from configuration.
///
/// Always satisfies `1 <= default_limit <= max_limit`, so a normalized limit
/// never exceeds the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationPolicy {
    default_limit: u32,
    max_limit: u32,
}

impl PaginationPolicy {
    pub fn new(default_limit: u32, max_limit: u32) -> Result<Self, PaginationError> {
        if default_limit == 0 || default_limit > max_limit {
            return Err(PaginationError {
                default_limit,
                max_limit,
            });
        }
        Ok(Self {
            default_limit,
            max_limit,
        })
    }

    /// Used whenever the requested limit is out of range.
    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Largest accepted limit (inclusive).
    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 30,
        }
    }
}

/// Normalized listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingParams {
    /// Inclusive lower bound on `Reception::opened_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `Reception::opened_at`.
    pub end: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl ListingParams {
    /// Build parameters from raw caller input.
    ///
    /// A page below 1 becomes 1; a limit outside `1..=max_limit` falls back to
    /// the policy default.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        page: i64,
        limit: i64,
        policy: &PaginationPolicy,
    ) -> Self {
        let page = page.clamp(1, i64::from(u32::MAX)) as u32;
        let limit = if (1..=i64::from(policy.max_limit())).contains(&limit) {
            limit as u32
        } else {
            policy.default_limit()
        };
        Self {
            start,
            end,
            page,
            limit,
        }
    }

    /// Number of pickup points to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Whether a reception opened at `opened_at` falls inside the bounds.
    pub fn covers(&self, opened_at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| opened_at >= start)
            && self.end.is_none_or(|end| opened_at <= end)
    }
}

/// One flattened join row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub pickup_point: PickupPoint,
    pub reception: Reception,
    pub product: Product,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionWithProducts {
    pub reception: Reception,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPointListing {
    #[serde(rename = "pvz")]
    pub pickup_point: PickupPoint,
    pub receptions: Vec<ReceptionWithProducts>,
}

/// Group join rows into the nested listing tree.
///
/// Pickup points appear in first-seen order, receptions in first-seen order
/// within their pickup point, products in row order within their reception.
/// Each distinct pickup point and reception yields exactly one entry no matter
/// how many rows reference it, and rows need not be contiguous.
pub fn group_listing_rows<I>(rows: I) -> Vec<PickupPointListing>
where
    I: IntoIterator<Item = ListingRow>,
{
    let mut listings: Vec<PickupPointListing> = Vec::new();
    let mut pickup_slots: HashMap<PickupPointId, usize> = HashMap::new();
    let mut reception_slots: HashMap<ReceptionId, (usize, usize)> = HashMap::new();

    for ListingRow {
        pickup_point,
        reception,
        product,
    } in rows
    {
        let p = *pickup_slots.entry(pickup_point.id).or_insert_with(|| {
            listings.push(PickupPointListing {
                pickup_point,
                receptions: Vec::new(),
            });
            listings.len() - 1
        });

        let (p, r) = *reception_slots.entry(reception.id).or_insert_with(|| {
            let receptions = &mut listings[p].receptions;
            receptions.push(ReceptionWithProducts {
                reception,
                products: Vec::new(),
            });
            (p, receptions.len() - 1)
        });

        listings[p].receptions[r].products.push(product);
    }

    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use pvz_core::ProductId;

    use crate::product::ProductType;
    use crate::reception::ReceptionStatus;

    fn pickup_point(city: &str) -> PickupPoint {
        PickupPoint {
            id: PickupPointId::new(),
            city: city.to_string(),
            registered_at: Utc::now(),
        }
    }

    fn reception(pickup_point: &PickupPoint) -> Reception {
        Reception {
            id: ReceptionId::new(),
            pickup_point_id: pickup_point.id,
            opened_at: Utc::now(),
            status: ReceptionStatus::InProgress,
        }
    }

    fn product(reception: &Reception, product_type: ProductType) -> Product {
        Product {
            id: ProductId::new(),
            reception_id: reception.id,
            product_type,
            added_at: Utc::now(),
        }
    }

    fn row(pp: &PickupPoint, r: &Reception, p: &Product) -> ListingRow {
        ListingRow {
            pickup_point: pp.clone(),
            reception: r.clone(),
            product: p.clone(),
        }
    }

    #[test]
    fn page_below_one_is_clamped() {
        let policy = PaginationPolicy::default();
        assert_eq!(ListingParams::new(None, None, 0, 5, &policy).page, 1);
        assert_eq!(ListingParams::new(None, None, -7, 5, &policy).page, 1);
        assert_eq!(ListingParams::new(None, None, 3, 5, &policy).page, 3);
    }

    #[test]
    fn out_of_range_limit_falls_back_to_default() {
        let policy = PaginationPolicy::default();
        assert_eq!(ListingParams::new(None, None, 1, 0, &policy).limit, 10);
        assert_eq!(ListingParams::new(None, None, 1, 31, &policy).limit, 10);
        assert_eq!(ListingParams::new(None, None, 1, 30, &policy).limit, 30);
        assert_eq!(ListingParams::new(None, None, 1, 1, &policy).limit, 1);
    }

    #[test]
    fn policy_rejects_default_above_max() {
        assert_eq!(
            PaginationPolicy::new(50, 30),
            Err(PaginationError {
                default_limit: 50,
                max_limit: 30
            })
        );
        assert!(PaginationPolicy::new(0, 30).is_err());
    }

    #[test]
    fn custom_policy_bounds_normalized_limits() {
        let policy = PaginationPolicy::new(5, 20).unwrap();
        assert_eq!(ListingParams::new(None, None, 1, 21, &policy).limit, 5);
        assert_eq!(ListingParams::new(None, None, 1, 20, &policy).limit, 20);
        assert_eq!(policy.max_limit(), 20);
    }

    #[test]
    fn offset_counts_pickup_points_on_previous_pages() {
        let params = ListingParams::new(None, None, 3, 4, &PaginationPolicy::default());
        assert_eq!(params.offset(), 8);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let now = Utc::now();
        let params = ListingParams::new(
            Some(now),
            Some(now + Duration::hours(1)),
            1,
            10,
            &PaginationPolicy::default(),
        );
        assert!(params.covers(now));
        assert!(params.covers(now + Duration::hours(1)));
        assert!(!params.covers(now - Duration::seconds(1)));
        assert!(!params.covers(now + Duration::hours(2)));
    }

    #[test]
    fn open_bounds_cover_everything() {
        let params = ListingParams::new(None, None, 1, 10, &PaginationPolicy::default());
        assert!(params.covers(DateTime::<Utc>::MIN_UTC));
        assert!(params.covers(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn groups_rows_into_one_entry_per_pickup_point_and_reception() {
        let pp = pickup_point("Москва");
        let r1 = reception(&pp);
        let r2 = reception(&pp);
        let a = product(&r1, ProductType::Electronics);
        let b = product(&r1, ProductType::Clothing);
        let c = product(&r2, ProductType::Shoes);

        let grouped = group_listing_rows(vec![row(&pp, &r1, &a), row(&pp, &r1, &b), row(&pp, &r2, &c)]);

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].pickup_point, pp);
        assert_eq!(grouped[0].receptions.len(), 2);
        assert_eq!(grouped[0].receptions[0].reception, r1);
        assert_eq!(grouped[0].receptions[0].products, vec![a, b]);
        assert_eq!(grouped[0].receptions[1].products, vec![c]);
    }

    #[test]
    fn non_contiguous_rows_keep_first_seen_order() {
        let first = pickup_point("Казань");
        let second = pickup_point("Москва");
        let r1 = reception(&first);
        let r2 = reception(&second);
        let a = product(&r1, ProductType::Shoes);
        let b = product(&r2, ProductType::Shoes);
        let c = product(&r1, ProductType::Clothing);

        let grouped = group_listing_rows(vec![row(&first, &r1, &a), row(&second, &r2, &b), row(&first, &r1, &c)]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].pickup_point.id, first.id);
        assert_eq!(grouped[1].pickup_point.id, second.id);
        assert_eq!(grouped[0].receptions[0].products, vec![a, c]);
    }

    #[test]
    fn no_rows_means_empty_listing() {
        assert!(group_listing_rows(Vec::new()).is_empty());
    }

    #[test]
    fn serializes_with_wire_names() {
        let pp = pickup_point("Москва");
        let r = reception(&pp);
        let p = product(&r, ProductType::Electronics);
        let json = serde_json::to_value(group_listing_rows(vec![row(&pp, &r, &p)])).unwrap();
        assert_eq!(json[0]["pvz"]["city"], "Москва");
        assert_eq!(json[0]["receptions"][0]["products"][0]["type"], "электроника");
    }

    /// Tree shape: pickup points → receptions → product count (each ≥ 1).
    fn tree_shape() -> impl Strategy<Value = Vec<Vec<usize>>> {
        prop::collection::vec(prop::collection::vec(1usize..5, 1..4), 0..6)
    }

    fn build_tree(shape: &[Vec<usize>]) -> Vec<PickupPointListing> {
        shape
            .iter()
            .map(|receptions| {
                let pp = pickup_point("Москва");
                let receptions = receptions
                    .iter()
                    .map(|&count| {
                        let r = reception(&pp);
                        let products = (0..count)
                            .map(|i| product(&r, ProductType::ALL[i % 3]))
                            .collect();
                        ReceptionWithProducts {
                            reception: r,
                            products,
                        }
                    })
                    .collect();
                PickupPointListing {
                    pickup_point: pp,
                    receptions,
                }
            })
            .collect()
    }

    fn flatten(tree: &[PickupPointListing]) -> Vec<ListingRow> {
        let mut rows = Vec::new();
        for listing in tree {
            for r in &listing.receptions {
                for p in &r.products {
                    rows.push(row(&listing.pickup_point, &r.reception, p));
                }
            }
        }
        rows
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: grouping an ordered row stream rebuilds the tree exactly.
        #[test]
        fn grouping_ordered_rows_rebuilds_the_tree(shape in tree_shape()) {
            let tree = build_tree(&shape);
            prop_assert_eq!(group_listing_rows(flatten(&tree)), tree);
        }

        /// Property: for any row order, every pickup point and reception appears
        /// exactly once, in first-seen order, and no product is lost.
        #[test]
        fn grouping_any_row_order_is_lossless(
            shape in tree_shape(),
            seed in any::<u64>()
        ) {
            let tree = build_tree(&shape);
            let mut rows = flatten(&tree);
            // Deterministic shuffle driven by the generated seed.
            let mut state = seed | 1;
            for i in (1..rows.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                rows.swap(i, (state % (i as u64 + 1)) as usize);
            }

            let mut first_seen: Vec<PickupPointId> = Vec::new();
            for r in &rows {
                if !first_seen.contains(&r.pickup_point.id) {
                    first_seen.push(r.pickup_point.id);
                }
            }

            let grouped = group_listing_rows(rows.clone());
            let grouped_ids: Vec<PickupPointId> =
                grouped.iter().map(|l| l.pickup_point.id).collect();
            prop_assert_eq!(grouped_ids, first_seen);

            let reception_count: usize = grouped.iter().map(|l| l.receptions.len()).sum();
            let expected_receptions: usize = shape.iter().map(Vec::len).sum();
            prop_assert_eq!(reception_count, expected_receptions);

            let product_count: usize = grouped
                .iter()
                .flat_map(|l| &l.receptions)
                .map(|r| r.products.len())
                .sum();
            prop_assert_eq!(product_count, rows.len());
        }
    }
}
