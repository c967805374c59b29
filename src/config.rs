//! Configuration
//!
//! Validated resolver tuning plus environment-driven settings for the
//! binary. Out-of-range values fail at construction, never at call time.

use crate::infrastructure::retry::RetryPolicy;
use std::time::Duration;

/// Tuning for the resolution layer.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// TTL for cached records
    pub cache_ttl: Duration,
    /// Consecutive provider failures before the breaker opens
    pub breaker_failure_threshold: u32,
    /// How long the breaker stays open before probing
    pub breaker_cool_down: Duration,
    /// Provider attempts per flight, including the first (>= 1)
    pub retry_max_attempts: u32,
    /// Delay before the second attempt
    pub retry_base_delay: Duration,
    /// Backoff multiplier per further attempt (> 1)
    pub retry_backoff_multiplier: f64,
    /// Cap on any single backoff delay
    pub retry_max_delay: Duration,
    /// Jitter fraction applied to backoff delays, in [0, 1)
    pub retry_jitter: f64,
    /// Timeout for each individual provider attempt
    pub attempt_timeout: Duration,
    /// Bulkhead: maximum simultaneous in-flight resolutions per batch
    pub batch_concurrency_limit: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(3600),
            breaker_failure_threshold: 5,
            breaker_cool_down: Duration::from_secs(30),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(200),
            retry_backoff_multiplier: 2.0,
            retry_max_delay: Duration::from_secs(5),
            retry_jitter: 0.0,
            attempt_timeout: Duration::from_secs(3),
            batch_concurrency_limit: 10,
        }
    }
}

impl ResolverConfig {
    /// Set the cache TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the breaker failure threshold.
    pub fn breaker_failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker_failure_threshold = threshold;
        self
    }

    /// Set the breaker cool-down.
    pub fn breaker_cool_down(mut self, cool_down: Duration) -> Self {
        self.breaker_cool_down = cool_down;
        self
    }

    /// Set the retry attempt budget.
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = attempts;
        self
    }

    /// Set the base backoff delay.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn retry_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_backoff_multiplier = multiplier;
        self
    }

    /// Set the per-attempt timeout.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the batch concurrency limit.
    pub fn batch_concurrency_limit(mut self, limit: usize) -> Self {
        self.batch_concurrency_limit = limit;
        self
    }

    /// Validate every field, rejecting out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::ZeroCacheTtl);
        }
        if self.breaker_failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.breaker_cool_down.is_zero() {
            return Err(ConfigError::ZeroCoolDown);
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::ZeroRetryAttempts);
        }
        if self.retry_base_delay.is_zero() {
            return Err(ConfigError::ZeroRetryBaseDelay);
        }
        if self.retry_backoff_multiplier <= 1.0 {
            return Err(ConfigError::BackoffMultiplierTooSmall);
        }
        if self.retry_max_delay < self.retry_base_delay {
            return Err(ConfigError::MaxDelayBelowBase);
        }
        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(ConfigError::JitterOutOfRange);
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::ZeroAttemptTimeout);
        }
        if self.batch_concurrency_limit == 0 {
            return Err(ConfigError::ZeroBatchConcurrency);
        }
        Ok(())
    }

    /// The retry policy this configuration describes.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: self.retry_base_delay,
            multiplier: self.retry_backoff_multiplier,
            max_delay: self.retry_max_delay,
            attempt_timeout: self.attempt_timeout,
            jitter: self.retry_jitter,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("cache_ttl must be positive")]
    ZeroCacheTtl,
    #[error("breaker_failure_threshold must be positive")]
    ZeroFailureThreshold,
    #[error("breaker_cool_down must be positive")]
    ZeroCoolDown,
    #[error("retry_max_attempts must be at least 1")]
    ZeroRetryAttempts,
    #[error("retry_base_delay must be positive")]
    ZeroRetryBaseDelay,
    #[error("retry_backoff_multiplier must be greater than 1")]
    BackoffMultiplierTooSmall,
    #[error("retry_max_delay must be at least retry_base_delay")]
    MaxDelayBelowBase,
    #[error("retry_jitter must be within [0, 1)")]
    JitterOutOfRange,
    #[error("attempt_timeout must be positive")]
    ZeroAttemptTimeout,
    #[error("batch_concurrency_limit must be positive")]
    ZeroBatchConcurrency,
}

/// Settings for the binary, loaded from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the geo provider endpoint
    pub provider_url: String,
    /// Provider name used for breaker keying and record provenance
    pub provider_name: String,
    /// Path to the SQLite database recording resolved records
    pub db_path: String,
    /// Verbose logging
    pub debug: bool,
    /// Resolution layer tuning
    pub resolver: ResolverConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://ip-api.com/json".to_string(),
            provider_name: "ip-api".to_string(),
            db_path: "georesolve.db".to_string(),
            debug: false,
            resolver: ResolverConfig::default(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Load service settings from `GEORESOLVE_*` environment variables,
/// falling back to defaults. The resolver tuning is validated before it
/// is returned.
pub fn load_config() -> anyhow::Result<ServiceConfig> {
    let defaults = ResolverConfig::default();

    let provider_url = std::env::var("GEORESOLVE_PROVIDER_URL")
        .unwrap_or_else(|_| "http://ip-api.com/json".to_string());

    let provider_name =
        std::env::var("GEORESOLVE_PROVIDER_NAME").unwrap_or_else(|_| "ip-api".to_string());

    let db_path =
        std::env::var("GEORESOLVE_DB_PATH").unwrap_or_else(|_| "georesolve.db".to_string());

    let debug = std::env::var("DEBUG").is_ok();

    let resolver = ResolverConfig {
        cache_ttl: Duration::from_secs(env_parsed(
            "GEORESOLVE_CACHE_TTL_SECS",
            defaults.cache_ttl.as_secs(),
        )),
        breaker_failure_threshold: env_parsed(
            "GEORESOLVE_BREAKER_THRESHOLD",
            defaults.breaker_failure_threshold,
        ),
        breaker_cool_down: Duration::from_secs(env_parsed(
            "GEORESOLVE_BREAKER_COOL_DOWN_SECS",
            defaults.breaker_cool_down.as_secs(),
        )),
        retry_max_attempts: env_parsed(
            "GEORESOLVE_RETRY_MAX_ATTEMPTS",
            defaults.retry_max_attempts,
        ),
        retry_base_delay: Duration::from_millis(env_parsed(
            "GEORESOLVE_RETRY_BASE_DELAY_MS",
            defaults.retry_base_delay.as_millis() as u64,
        )),
        retry_backoff_multiplier: env_parsed(
            "GEORESOLVE_RETRY_BACKOFF_MULTIPLIER",
            defaults.retry_backoff_multiplier,
        ),
        retry_max_delay: Duration::from_millis(env_parsed(
            "GEORESOLVE_RETRY_MAX_DELAY_MS",
            defaults.retry_max_delay.as_millis() as u64,
        )),
        retry_jitter: env_parsed("GEORESOLVE_RETRY_JITTER", defaults.retry_jitter),
        attempt_timeout: Duration::from_millis(env_parsed(
            "GEORESOLVE_ATTEMPT_TIMEOUT_MS",
            defaults.attempt_timeout.as_millis() as u64,
        )),
        batch_concurrency_limit: env_parsed(
            "GEORESOLVE_BATCH_CONCURRENCY",
            defaults.batch_concurrency_limit,
        ),
    };

    resolver.validate()?;

    Ok(ServiceConfig {
        provider_url,
        provider_name,
        db_path,
        debug,
        resolver,
    })
}
