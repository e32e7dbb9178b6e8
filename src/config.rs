// Configuration for the selection engine, the catalog store and the backend client

use crate::validator::TieBreakPolicy;
use serde::{Deserialize, Serialize};

// Engine configuration options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tie_break: TieBreakPolicy,
}

// Catalog store configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogStoreConfig {
    pub default_ttl_seconds: u64,
    pub max_catalogs: usize,
}

impl Default for CatalogStoreConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 1800,
            max_catalogs: 10_000,
        }
    }
}

// Retry configuration for backend calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

// Booking backend client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            timeout_ms: 5000,
            retry: RetryConfig::default(),
        }
    }
}

// Missing sections and fields fall back to their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub engine: EngineConfig,
    pub store: CatalogStoreConfig,
    pub backend: BackendConfig,
}

impl BookingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = BookingConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BookingConfig::default());
        assert_eq!(config.engine.tie_break, TieBreakPolicy::CheapestThenListed);
    }

    #[test]
    fn test_partial_document_overrides_fields() -> anyhow::Result<()> {
        let config = BookingConfig::from_json_str(
            r#"{
                "engine": { "tie_break": "reject_ambiguous" },
                "store": { "default_ttl_seconds": 60 },
                "backend": { "base_url": "https://booking.example.com", "retry": { "max_retries": 1 } }
            }"#,
        )?;

        assert_eq!(config.engine.tie_break, TieBreakPolicy::RejectAmbiguous);
        assert_eq!(config.store.default_ttl_seconds, 60);
        assert_eq!(config.store.max_catalogs, 10_000);
        assert_eq!(config.backend.base_url, "https://booking.example.com");
        assert_eq!(config.backend.retry.max_retries, 1);
        assert_eq!(config.backend.retry.initial_backoff_ms, 100);
        Ok(())
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let result = BookingConfig::from_json_str(r#"{ "engine": { "tie_break": "random" } }"#);
        assert!(result.is_err());
    }
}
