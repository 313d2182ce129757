//! Cache configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults for development; per-namespace TTLs can be tuned in code via
//! the builder methods.

use std::collections::HashMap;
use std::time::Duration;

use crate::namespace;

/// Configuration for the aggregate cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL per namespace; namespaces not listed use `default_ttl`.
    pub namespace_ttls: HashMap<String, Duration>,
    /// TTL for namespaces without an explicit entry.
    pub default_ttl: Duration,
    /// When true, an unreachable store fails the request instead of
    /// degrading to a direct computation. Default is fail-open.
    pub fail_closed: bool,
    /// Upper bound on a single compute invocation; `None` disables it.
    pub compute_timeout: Option<Duration>,
    /// TTL on background-job in-progress markers. The backstop for a
    /// worker that dies before clearing its marker.
    pub marker_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let mut namespace_ttls = HashMap::new();
        namespace_ttls.insert(
            namespace::BEST_TIMES.to_string(),
            Duration::from_secs(3600),
        );
        namespace_ttls.insert(
            namespace::MEMBER_ROSTER.to_string(),
            Duration::from_secs(900),
        );
        namespace_ttls.insert(namespace::REPORTS.to_string(), Duration::from_secs(3600));

        Self {
            namespace_ttls,
            default_ttl: Duration::from_secs(300),
            fail_closed: false,
            compute_timeout: None,
            marker_ttl: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `MEDLEY_CACHE_DEFAULT_TTL_SECS`: TTL for unlisted namespaces (default: 300)
    /// - `MEDLEY_CACHE_FAIL_CLOSED`: "true" or "false" (default: false)
    /// - `MEDLEY_CACHE_COMPUTE_TIMEOUT_MS`: compute bound in ms, 0 disables (default: 0)
    /// - `MEDLEY_CACHE_MARKER_TTL_SECS`: job marker TTL (default: 600)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = std::env::var("MEDLEY_CACHE_DEFAULT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.default_ttl = Duration::from_secs(secs);
        }

        config.fail_closed = std::env::var("MEDLEY_CACHE_FAIL_CLOSED")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        if let Some(ms) = std::env::var("MEDLEY_CACHE_COMPUTE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.compute_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        if let Some(secs) = std::env::var("MEDLEY_CACHE_MARKER_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.marker_ttl = Duration::from_secs(secs);
        }

        config
    }

    /// Set the TTL for one namespace.
    pub fn with_namespace_ttl(mut self, namespace: impl Into<String>, ttl: Duration) -> Self {
        self.namespace_ttls.insert(namespace.into(), ttl);
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Choose fail-closed behavior for store outages.
    pub fn with_fail_closed(mut self, fail_closed: bool) -> Self {
        self.fail_closed = fail_closed;
        self
    }

    /// Bound each compute invocation.
    pub fn with_compute_timeout(mut self, timeout: Duration) -> Self {
        self.compute_timeout = Some(timeout);
        self
    }

    /// Set the in-progress marker TTL.
    pub fn with_marker_ttl(mut self, ttl: Duration) -> Self {
        self.marker_ttl = ttl;
        self
    }

    /// TTL applied to entries in the given namespace.
    pub fn ttl_for(&self, namespace: &str) -> Duration {
        self.namespace_ttls
            .get(namespace)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespace_ttls() {
        let config = CacheConfig::default();
        assert_eq!(
            config.ttl_for(namespace::BEST_TIMES),
            Duration::from_secs(3600)
        );
        assert_eq!(
            config.ttl_for(namespace::MEMBER_ROSTER),
            Duration::from_secs(900)
        );
        assert_eq!(config.ttl_for("something_else"), Duration::from_secs(300));
        assert!(!config.fail_closed);
    }

    #[test]
    fn test_builder_methods() {
        let config = CacheConfig::new()
            .with_namespace_ttl("best_times", Duration::from_secs(60))
            .with_default_ttl(Duration::from_secs(30))
            .with_fail_closed(true)
            .with_compute_timeout(Duration::from_millis(250))
            .with_marker_ttl(Duration::from_secs(120));

        assert_eq!(config.ttl_for("best_times"), Duration::from_secs(60));
        assert_eq!(config.ttl_for("unknown"), Duration::from_secs(30));
        assert!(config.fail_closed);
        assert_eq!(config.compute_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.marker_ttl, Duration::from_secs(120));
    }
}
