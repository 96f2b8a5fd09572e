use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, PickupPointId, ProductId, ReceptionId};

/// Recognized product categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "электроника")]
    Electronics,
    #[serde(rename = "одежда")]
    Clothing,
    #[serde(rename = "обувь")]
    Shoes,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [
        ProductType::Electronics,
        ProductType::Clothing,
        ProductType::Shoes,
    ];

    /// Storage/wire literal.
    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Electronics => "электроника",
            ProductType::Clothing => "одежда",
            ProductType::Shoes => "обувь",
        }
    }
}

impl core::fmt::Display for ProductType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the wire literals and the English names (case-insensitive).
impl FromStr for ProductType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "электроника" | "electronics" => Ok(ProductType::Electronics),
            "одежда" | "clothing" => Ok(ProductType::Clothing),
            "обувь" | "shoes" => Ok(ProductType::Shoes),
            _ => Err(DomainError::invalid_type(s)),
        }
    }
}

/// An item scanned into a reception. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub reception_id: ReceptionId,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    #[serde(rename = "dateTime")]
    pub added_at: DateTime<Utc>,
}

/// A product about to be appended to whichever reception is open at the
/// pickup point; the store resolves the reception and stamps `added_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewProduct {
    pub id: ProductId,
    pub pickup_point_id: PickupPointId,
    pub product_type: ProductType,
}

impl NewProduct {
    pub fn for_pickup_point(pickup_point_id: PickupPointId, product_type: ProductType) -> Self {
        Self {
            id: ProductId::new(),
            pickup_point_id,
            product_type,
        }
    }
}
