use std::{env, str::FromStr, time::Duration};

use tablestore_core::storage::{IndexNames, StoreConfig};

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Table addressing and store tuning.
    pub store: StoreConfig,
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TABLE_NAME` - Table name (default: "tablestore")
    /// - `GSI1_NAME`..`GSI4_NAME` - Physical index names (default: "GSI1".."GSI4")
    /// - `BATCH_GET_LIMIT` - Keys per batch read (default: 100)
    /// - `BATCH_WRITE_LIMIT` - Entries per batch write (default: 25)
    /// - `DEFAULT_PAGE_SIZE` - Query page size (default: 25)
    /// - `MAX_QUERY_ITEMS` - Cap for multi-page queries (default: 1,000)
    /// - `BATCH_RETRY_ATTEMPTS` - Retries of unprocessed batch entries (default: 3)
    /// - `BATCH_RETRY_BASE_DELAY_MS` - Base backoff delay (default: 50)
    /// - `CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 300)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    ///
    /// Missing or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = StoreConfig::default();
        let index_defaults = IndexNames::default();

        let store = StoreConfig {
            table_name: lookup("TABLE_NAME").unwrap_or_else(|| defaults.table_name.clone()),
            index_names: IndexNames {
                gsi1: lookup("GSI1_NAME").unwrap_or(index_defaults.gsi1),
                gsi2: lookup("GSI2_NAME").unwrap_or(index_defaults.gsi2),
                gsi3: lookup("GSI3_NAME").unwrap_or(index_defaults.gsi3),
                gsi4: lookup("GSI4_NAME").unwrap_or(index_defaults.gsi4),
            },
            batch_retry_attempts: parse_var(&lookup, "BATCH_RETRY_ATTEMPTS")
                .unwrap_or(defaults.batch_retry_attempts),
            batch_retry_base_delay: parse_var(&lookup, "BATCH_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_retry_base_delay),
            ..defaults.clone()
        }
        .with_batch_limits(
            parse_var(&lookup, "BATCH_GET_LIMIT").unwrap_or(defaults.batch_get_limit),
            parse_var(&lookup, "BATCH_WRITE_LIMIT").unwrap_or(defaults.batch_write_limit),
        )
        .with_default_page_size(
            parse_var(&lookup, "DEFAULT_PAGE_SIZE").unwrap_or(defaults.default_page_size),
        )
        .with_max_items(parse_var(&lookup, "MAX_QUERY_ITEMS").unwrap_or(defaults.max_items));

        Self {
            store,
            cache_ttl_seconds: parse_var(&lookup, "CACHE_TTL_SECONDS").unwrap_or(300),
            cache_max_entries: parse_var(&lookup, "CACHE_MAX_ENTRIES")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(10_000),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_cache_ttl_conversion() {
        let config = Config {
            store: StoreConfig::default(),
            cache_ttl_seconds: 600,
            cache_max_entries: 10_000,
        };

        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);

        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.cache_ttl_seconds, 300);
        assert_eq!(config.cache_max_entries, 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TABLE_NAME", "prod-users"),
            ("GSI2_NAME", "by-external"),
            ("BATCH_GET_LIMIT", "50"),
            ("BATCH_WRITE_LIMIT", "10"),
            ("DEFAULT_PAGE_SIZE", "5"),
            ("MAX_QUERY_ITEMS", "200"),
            ("BATCH_RETRY_ATTEMPTS", "1"),
            ("BATCH_RETRY_BASE_DELAY_MS", "10"),
            ("CACHE_TTL_SECONDS", "60"),
            ("CACHE_MAX_ENTRIES", "42"),
        ]);

        assert_eq!(config.store.table_name, "prod-users");
        assert_eq!(config.store.index_names.gsi1, "GSI1");
        assert_eq!(config.store.index_names.gsi2, "by-external");
        assert_eq!(config.store.batch_get_limit, 50);
        assert_eq!(config.store.batch_write_limit, 10);
        assert_eq!(config.store.default_page_size, 5);
        assert_eq!(config.store.max_items, 200);
        assert_eq!(config.store.batch_retry_attempts, 1);
        assert_eq!(
            config.store.batch_retry_base_delay,
            Duration::from_millis(10)
        );
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache_max_entries, 42);
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config_from(&[
            ("BATCH_GET_LIMIT", "lots"),
            ("CACHE_MAX_ENTRIES", "0"),
            ("DEFAULT_PAGE_SIZE", "-1"),
        ]);

        assert_eq!(config.store.batch_get_limit, 100);
        assert_eq!(config.store.default_page_size, 25);
        assert_eq!(config.cache_max_entries, 10_000);
    }
}
