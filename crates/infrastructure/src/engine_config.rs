//! Environment-driven configuration for engine hosts.

use std::env;
use std::time::Duration;

use grantline_application::ResolverConfig;
use grantline_core::{AppError, AppResult};
use grantline_domain::VisibilityPolicy;

/// Runtime configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Optional Redis connection string; absent means the in-memory
    /// snapshot cache.
    pub redis_url: Option<String>,
    /// Resolver tuning derived from the remaining variables.
    pub resolver: ResolverConfig,
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    ///
    /// Variables: `DATABASE_URL` (required), `REDIS_URL`,
    /// `SNAPSHOT_TTL_SECONDS`, `FACET_TIMEOUT_SECONDS` (2 to 5),
    /// `MAX_CONCURRENT_ROLE_FETCHES`, `EMPTY_MODULE_VISIBILITY`
    /// (`visible` | `hidden`).
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let defaults = ResolverConfig::default();

        let snapshot_ttl_seconds = match env::var("SNAPSHOT_TTL_SECONDS") {
            Ok(value) => value.parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid SNAPSHOT_TTL_SECONDS: {error}"))
            })?,
            Err(_) => defaults.snapshot_ttl_seconds,
        };
        if snapshot_ttl_seconds == 0 {
            return Err(AppError::Validation(
                "SNAPSHOT_TTL_SECONDS must be at least 1".to_owned(),
            ));
        }

        let facet_timeout = match env::var("FACET_TIMEOUT_SECONDS") {
            Ok(value) => {
                let seconds = value.parse::<u64>().map_err(|error| {
                    AppError::Validation(format!("invalid FACET_TIMEOUT_SECONDS: {error}"))
                })?;
                if !(2..=5).contains(&seconds) {
                    return Err(AppError::Validation(
                        "FACET_TIMEOUT_SECONDS must be between 2 and 5".to_owned(),
                    ));
                }
                Duration::from_secs(seconds)
            }
            Err(_) => defaults.facet_timeout,
        };

        let max_concurrent_role_fetches = match env::var("MAX_CONCURRENT_ROLE_FETCHES") {
            Ok(value) => {
                let fetches = value.parse::<usize>().map_err(|error| {
                    AppError::Validation(format!("invalid MAX_CONCURRENT_ROLE_FETCHES: {error}"))
                })?;
                if fetches == 0 {
                    return Err(AppError::Validation(
                        "MAX_CONCURRENT_ROLE_FETCHES must be at least 1".to_owned(),
                    ));
                }
                fetches
            }
            Err(_) => defaults.max_concurrent_role_fetches,
        };

        let visibility_policy = match env::var("EMPTY_MODULE_VISIBILITY") {
            Ok(value) => parse_visibility(value.as_str())?,
            Err(_) => defaults.visibility_policy,
        };

        Ok(Self {
            database_url,
            redis_url,
            resolver: ResolverConfig {
                snapshot_ttl_seconds,
                facet_timeout,
                max_concurrent_role_fetches,
                visibility_policy,
            },
        })
    }
}

fn parse_visibility(value: &str) -> AppResult<VisibilityPolicy> {
    match value {
        "visible" => Ok(VisibilityPolicy::TreatEmptyAsVisible),
        "hidden" => Ok(VisibilityPolicy::TreatEmptyAsHidden),
        other => Err(AppError::Validation(format!(
            "EMPTY_MODULE_VISIBILITY must be either 'visible' or 'hidden', got '{other}'"
        ))),
    }
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

#[cfg(test)]
mod tests {
    use grantline_domain::VisibilityPolicy;

    use super::parse_visibility;

    #[test]
    fn visibility_values_parse() {
        assert!(matches!(
            parse_visibility("visible"),
            Ok(VisibilityPolicy::TreatEmptyAsVisible)
        ));
        assert!(matches!(
            parse_visibility("hidden"),
            Ok(VisibilityPolicy::TreatEmptyAsHidden)
        ));
        assert!(parse_visibility("translucent").is_err());
    }
}
