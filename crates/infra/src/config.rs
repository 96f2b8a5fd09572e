//! Configuration loading and representation.
//!
//! Read once from the environment at startup and injected into services;
//! nothing here is mutable afterwards.

use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use pvz_receiving::{CityAllowList, PaginationPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvzConfig {
    pub database: DatabaseConfig,
    pub allowed_cities: CityAllowList,
    pub pagination: PaginationPolicy,
}

impl PvzConfig {
    /// Load from `PVZ_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: required_env("PVZ_DATABASE_URL")?,
            max_connections: parsed_env("PVZ_DB_MAX_CONNECTIONS", 25)?,
            acquire_timeout: Duration::from_secs(parsed_env("PVZ_DB_ACQUIRE_TIMEOUT_SECS", 5)?),
        };

        let allowed_cities = match env::var("PVZ_ALLOWED_CITIES") {
            Ok(raw) => parse_cities(&raw)?,
            Err(_) => CityAllowList::default(),
        };

        let defaults = PaginationPolicy::default();
        let pagination = PaginationPolicy::new(
            parsed_env("PVZ_PAGE_DEFAULT_LIMIT", defaults.default_limit())?,
            parsed_env("PVZ_PAGE_MAX_LIMIT", defaults.max_limit())?,
        )
        .context("invalid PVZ_PAGE_DEFAULT_LIMIT / PVZ_PAGE_MAX_LIMIT")?;

        Ok(Self {
            database,
            allowed_cities,
            pagination,
        })
    }
}

pub fn required_env(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing env: {name}"))
}

fn parsed_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid value for {name}: {err}")),
        Err(_) => Ok(default),
    }
}

fn parse_cities(raw: &str) -> Result<CityAllowList> {
    let list = CityAllowList::new(raw.split(','));
    if list.cities().is_empty() {
        return Err(anyhow!("PVZ_ALLOWED_CITIES must name at least one city"));
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            unsafe { env::remove_var(self.key) };
        }
    }

    fn set_env(key: &'static str, value: &str) -> EnvGuard {
        unsafe { env::set_var(key, value) };
        EnvGuard { key }
    }

    #[test]
    fn required_env_reads_value() {
        let _guard = set_env("PVZ_TEST_REQUIRED_ENV_PRESENT", "value");
        assert_eq!(required_env("PVZ_TEST_REQUIRED_ENV_PRESENT").unwrap(), "value");
    }

    #[test]
    fn required_env_missing_returns_error() {
        unsafe { env::remove_var("PVZ_TEST_REQUIRED_ENV_MISSING") };
        assert!(required_env("PVZ_TEST_REQUIRED_ENV_MISSING").is_err());
    }

    #[test]
    fn parsed_env_uses_default_when_unset() {
        unsafe { env::remove_var("PVZ_TEST_PARSED_DEFAULT") };
        assert_eq!(parsed_env("PVZ_TEST_PARSED_DEFAULT", 7u32).unwrap(), 7);
    }

    #[test]
    fn parsed_env_rejects_garbage() {
        let _guard = set_env("PVZ_TEST_PARSED_INVALID", "many");
        assert!(parsed_env("PVZ_TEST_PARSED_INVALID", 7u32).is_err());
    }

    #[test]
    fn from_env_rejects_default_limit_above_max() {
        let _url = set_env("PVZ_DATABASE_URL", "postgres://localhost/pvz");
        let _default = set_env("PVZ_PAGE_DEFAULT_LIMIT", "50");
        let _max = set_env("PVZ_PAGE_MAX_LIMIT", "30");
        let err = PvzConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PVZ_PAGE_DEFAULT_LIMIT"));
    }

    #[test]
    fn cities_are_split_and_trimmed() {
        let list = parse_cities("Москва, Тверь ,").unwrap();
        assert_eq!(list.cities(), &["Москва".to_string(), "Тверь".to_string()]);
    }

    #[test]
    fn empty_city_list_is_rejected() {
        assert!(parse_cities(" , ").is_err());
    }
}
