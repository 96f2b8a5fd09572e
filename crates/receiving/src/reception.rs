use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, DomainResult, PickupPointId, ReceptionId};

/// Reception lifecycle: created `InProgress`, closed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceptionStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "close")]
    Closed,
}

impl ReceptionStatus {
    /// Storage/wire literal.
    pub fn as_str(self) -> &'static str {
        match self {
            ReceptionStatus::InProgress => "in_progress",
            ReceptionStatus::Closed => "close",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(ReceptionStatus::InProgress),
            "close" => Some(ReceptionStatus::Closed),
            _ => None,
        }
    }
}

impl core::fmt::Display for ReceptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A goods-receiving session at a pickup point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reception {
    pub id: ReceptionId,
    #[serde(rename = "pvzId")]
    pub pickup_point_id: PickupPointId,
    #[serde(rename = "dateTime")]
    pub opened_at: DateTime<Utc>,
    pub status: ReceptionStatus,
}

impl Reception {
    pub fn is_open(&self) -> bool {
        self.status == ReceptionStatus::InProgress
    }

    /// The OPEN → CLOSED transition. A closed reception is never addressable
    /// again, so closing it reports `NoOpenReception`.
    pub fn close(&self) -> DomainResult<Reception> {
        if !self.is_open() {
            return Err(DomainError::NoOpenReception);
        }
        Ok(Reception {
            status: ReceptionStatus::Closed,
            ..self.clone()
        })
    }
}

/// A reception about to be opened; the store stamps `opened_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewReception {
    pub id: ReceptionId,
    pub pickup_point_id: PickupPointId,
}

impl NewReception {
    pub fn for_pickup_point(pickup_point_id: PickupPointId) -> Self {
        Self {
            id: ReceptionId::new(),
            pickup_point_id,
        }
    }
}
