use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, DomainResult, PickupPointId};

/// A registered pickup point. Never updated or deleted once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupPoint {
    pub id: PickupPointId,
    pub city: String,
    #[serde(rename = "registrationDate")]
    pub registered_at: DateTime<Utc>,
}

/// A pickup point that passed the allow-list check but has not been stored
/// yet. The store assigns the registration timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPickupPoint {
    pub id: PickupPointId,
    pub city: String,
}

/// Cities in which pickup points may be opened.
///
/// Part of the immutable configuration; there is no runtime mutation API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityAllowList {
    cities: Vec<String>,
}

impl CityAllowList {
    pub fn new<I, S>(cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for city in cities {
            let city = city.into().trim().to_string();
            if !city.is_empty() && !list.contains(&city) {
                list.push(city);
            }
        }
        Self { cities: list }
    }

    pub fn contains(&self, city: &str) -> bool {
        self.cities.iter().any(|c| c == city)
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    /// Validate `city` and mint the identifier of the pickup point to create.
    pub fn admit(&self, city: &str) -> DomainResult<NewPickupPoint> {
        if !self.contains(city) {
            return Err(DomainError::city_not_allowed(city));
        }
        Ok(NewPickupPoint {
            id: PickupPointId::new(),
            city: city.to_string(),
        })
    }
}

impl Default for CityAllowList {
    fn default() -> Self {
        Self::new(["Москва", "Санкт-Петербург", "Казань"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_admits_the_three_cities() {
        let list = CityAllowList::default();
        for city in ["Москва", "Санкт-Петербург", "Казань"] {
            let admitted = list.admit(city).unwrap();
            assert_eq!(admitted.city, city);
        }
    }

    #[test]
    fn unknown_city_is_rejected() {
        let err = CityAllowList::default().admit("Омск").unwrap_err();
        assert_eq!(err, DomainError::CityNotAllowed("Омск".to_string()));
    }

    #[test]
    fn matching_is_exact() {
        let list = CityAllowList::default();
        assert!(!list.contains("москва"));
        assert!(!list.contains(" Москва"));
    }

    #[test]
    fn construction_trims_and_deduplicates() {
        let list = CityAllowList::new([" Казань ", "Казань", "", "Тверь"]);
        assert_eq!(list.cities(), &["Казань".to_string(), "Тверь".to_string()]);
    }

    #[test]
    fn each_admission_gets_a_fresh_id() {
        let list = CityAllowList::default();
        let a = list.admit("Казань").unwrap();
        let b = list.admit("Казань").unwrap();
        assert_ne!(a.id, b.id);
    }
}
