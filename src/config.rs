//! Engine configuration (§10.3 expansion of §6's "Configuration surface").
//!
//! Grounded on the teacher's `limits/mod.rs::ExecutionLimits`: a plain
//! struct of tunables with a sane `Default` and a `from_env()` reader, no
//! builder ceremony. Field names follow §6's configuration surface
//! (`maxConcurrency`, `cleanupIntervalMs`, `cleanupTtlMs`,
//! `cleanupMaxExecutions`) translated to idiomatic `snake_case` `Duration`s.

use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_CLEANUP_TTL_MS: u64 = 30 * 60_000;
pub const DEFAULT_CLEANUP_MAX_EXECUTIONS: usize = 50;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_concurrency: usize,
    pub cleanup_interval: Duration,
    pub cleanup_ttl: Duration,
    pub cleanup_max_executions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cleanup_interval: Duration::from_millis(DEFAULT_CLEANUP_INTERVAL_MS),
            cleanup_ttl: Duration::from_millis(DEFAULT_CLEANUP_TTL_MS),
            cleanup_max_executions: DEFAULT_CLEANUP_MAX_EXECUTIONS,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from `ENGINE_MAX_CONCURRENCY`, `ENGINE_CLEANUP_INTERVAL_MS`,
    /// `ENGINE_CLEANUP_TTL_MS`, `ENGINE_CLEANUP_MAX_EXECUTIONS`. Unset or
    /// unparsable variables fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ENGINE_MAX_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.max_concurrency = n;
            }
        }
        if let Ok(val) = std::env::var("ENGINE_CLEANUP_INTERVAL_MS") {
            if let Ok(n) = val.parse() {
                config.cleanup_interval = Duration::from_millis(n);
            }
        }
        if let Ok(val) = std::env::var("ENGINE_CLEANUP_TTL_MS") {
            if let Ok(n) = val.parse() {
                config.cleanup_ttl = Duration::from_millis(n);
            }
        }
        if let Ok(val) = std::env::var("ENGINE_CLEANUP_MAX_EXECUTIONS") {
            if let Ok(n) = val.parse() {
                config.cleanup_max_executions = n;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_configuration_surface() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrency, 3);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert_eq!(config.cleanup_ttl, Duration::from_secs(30 * 60));
        assert_eq!(config.cleanup_max_executions, 50);
    }

    #[test]
    fn from_env_overrides_only_set_variables() {
        std::env::set_var("ENGINE_MAX_CONCURRENCY", "7");
        std::env::remove_var("ENGINE_CLEANUP_INTERVAL_MS");
        let config = EngineConfig::from_env();
        assert_eq!(config.max_concurrency, 7);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        std::env::remove_var("ENGINE_MAX_CONCURRENCY");
    }
}
