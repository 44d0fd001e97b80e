//! Runtime configuration read from the environment.
//!
//! ## Environment variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | `postgres://localhost/storefront` |
//! | `DB_MAX_CONNECTIONS` | 10 |
//! | `DB_CONNECT_TIMEOUT_SECS` | 30 |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | 3000 |
//! | `REDIS_ENABLED` | true |
//! | `REDIS_URL` | `redis://localhost:6379` |
//! | `CACHE_PREFIX` | `sf:` |
//! | `CACHE_ENTITY_TTL_SECS` | 600 |
//! | `CACHE_LIST_TTL_SECS` | 300 |
//! | `CACHE_OP_TIMEOUT_MS` | 250 |

use std::time::Duration;

use storefront_core::defaults;
use storefront_db::PoolConfig;

/// Cache-aside settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub redis_url: String,
    /// Prepended to every key.
    pub prefix: String,
    /// TTL for single-category entries.
    pub entity_ttl: Duration,
    /// TTL for list and search entries.
    pub list_ttl: Duration,
    /// Upper bound on any single backend call.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_url: "redis://localhost:6379".to_string(),
            prefix: defaults::CACHE_PREFIX.to_string(),
            entity_ttl: Duration::from_secs(defaults::CACHE_ENTITY_TTL_SECS),
            list_ttl: Duration::from_secs(defaults::CACHE_LIST_TTL_SECS),
            op_timeout: Duration::from_millis(defaults::CACHE_OP_TIMEOUT_MS),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = get("REDIS_ENABLED") {
            config.enabled = v != "false" && v != "0";
        }
        if let Some(url) = get("REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(prefix) = get("CACHE_PREFIX") {
            config.prefix = prefix;
        }
        if let Some(secs) = parse(&get, "CACHE_ENTITY_TTL_SECS") {
            config.entity_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse(&get, "CACHE_LIST_TTL_SECS") {
            config.list_ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse(&get, "CACHE_OP_TIMEOUT_MS") {
            config.op_timeout = Duration::from_millis(ms);
        }
        config
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let get = |k: &str| std::env::var(k).ok();
        Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/storefront".to_string()),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&get, "PORT").unwrap_or(3000),
            pool: PoolConfig::from_env(),
            cache: CacheConfig::from_env(),
        }
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_cache_config_defaults() {
        let config = CacheConfig::from_lookup(lookup(&[]));
        assert_eq!(config, CacheConfig::default());
        assert_eq!(config.entity_ttl, Duration::from_secs(600));
        assert_eq!(config.list_ttl, Duration::from_secs(300));
        assert_eq!(config.prefix, "sf:");
    }

    #[test]
    fn test_cache_config_overrides() {
        let config = CacheConfig::from_lookup(lookup(&[
            ("REDIS_ENABLED", "false"),
            ("CACHE_PREFIX", "shop:"),
            ("CACHE_LIST_TTL_SECS", "60"),
            ("CACHE_OP_TIMEOUT_MS", "not-a-number"),
        ]));
        assert!(!config.enabled);
        assert_eq!(config.prefix, "shop:");
        assert_eq!(config.list_ttl, Duration::from_secs(60));
        // Unparsable values keep the default
        assert_eq!(config.op_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            pool: PoolConfig::default(),
            cache: CacheConfig::default(),
        };
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}
