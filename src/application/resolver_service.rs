//! Resolver Service - Main application use case
//!
//! Orchestrates single-key resolution through cache, breaker, dedup and
//! retry, and exposes the bounded batch resolver. This is the primary
//! interface for callers.

use crate::config::{ConfigError, ResolverConfig};
use crate::domain::entities::{GeoRecord, KeyError, LookupKey, RecordIssue};
use crate::domain::ports::{GeoProvider, GeoStore};
use crate::infrastructure::circuit_breaker::{BreakerConfig, CircuitBreaker, CircuitState};
use crate::infrastructure::dedup::Deduplicator;
use crate::infrastructure::retry;
use crate::infrastructure::retry::RetryError;
use crate::infrastructure::TtlCache;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Why a resolution failed.
///
/// Clonable so the single outcome of a coalesced flight can be delivered
/// to every waiter. Callers branch on the variant, never on message text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// Malformed or empty key; rejected before any side effect.
    #[error("invalid lookup key: {0}")]
    InvalidInput(#[from] KeyError),
    /// The breaker refused the call; retry later.
    #[error("geo provider circuit is open")]
    CircuitOpen,
    /// The provider failed after exhausting the retry budget.
    #[error(transparent)]
    Provider(#[from] RetryError),
    /// The provider responded but the payload is structurally incomplete.
    #[error("provider returned an incomplete record: {0}")]
    Validation(#[from] RecordIssue),
    /// The in-flight resolution died without an outcome.
    #[error("resolution aborted internally")]
    Aborted,
}

/// Resolution service with injected collaborators.
///
/// All state (cache, breaker, in-flight table) belongs to the instance;
/// independent instances never interfere.
pub struct ResolverService {
    config: ResolverConfig,
    cache: Arc<TtlCache>,
    breaker: Arc<CircuitBreaker>,
    inflight: Deduplicator<LookupKey, Result<GeoRecord, ResolveError>>,
    batch_permits: Arc<Semaphore>,
    provider: Arc<dyn GeoProvider>,
    store: Arc<dyn GeoStore>,
}

impl ResolverService {
    /// Create a new service.
    ///
    /// The configuration is validated here; an out-of-range value is
    /// reported before any `resolve` call is possible.
    pub fn new(
        config: ResolverConfig,
        provider: Arc<dyn GeoProvider>,
        store: Arc<dyn GeoStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let batch_permits = Arc::new(Semaphore::new(config.batch_concurrency_limit));

        Ok(Self {
            breaker: Arc::new(CircuitBreaker::new(BreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                cool_down: config.breaker_cool_down,
            })),
            cache: Arc::new(TtlCache::new()),
            inflight: Deduplicator::new(),
            batch_permits,
            config,
            provider,
            store,
        })
    }

    /// Resolve a single key to an enriched record.
    ///
    /// Fast path: cache hit. Slow path: breaker gate, then one coalesced,
    /// retry-wrapped provider flight whose outcome (including cache fill,
    /// best-effort persistence and breaker accounting) is shared by every
    /// concurrent caller of the same key.
    pub async fn resolve(&self, raw_key: &str) -> Result<GeoRecord, ResolveError> {
        let key = LookupKey::parse(raw_key)?;

        // Non-routable addresses carry no geographic information; classify
        // locally without spending a provider call.
        if key.is_private() {
            if let Some(hit) = self.cache.get(&key) {
                return Ok(hit);
            }
            let record = GeoRecord::private_network(key.ip());
            self.cache.set(key, record.clone(), self.config.cache_ttl);
            return Ok(record);
        }

        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(key = %key, "cache hit");
            return Ok(hit);
        }

        let endpoint = self.provider.name().to_string();
        if !self.breaker.allow(&endpoint) {
            tracing::debug!(key = %key, endpoint = %endpoint, "circuit open, failing fast");
            return Err(ResolveError::CircuitOpen);
        }

        let cache = self.cache.clone();
        let breaker = self.breaker.clone();
        let provider = self.provider.clone();
        let store = self.store.clone();
        let policy = self.config.retry_policy();
        let ttl = self.config.cache_ttl;
        let ip = key.ip();

        let outcome = self
            .inflight
            .join_or_start(key, move || async move {
                let fetched = retry::execute(&policy, || {
                    let provider = provider.clone();
                    async move { provider.fetch(ip).await }
                })
                .await;

                let outcome = match fetched {
                    Ok(record) => match record.validate() {
                        Ok(()) => Ok(record),
                        Err(issue) => Err(ResolveError::Validation(issue)),
                    },
                    Err(err) => Err(ResolveError::Provider(err)),
                };

                // Side effects happen exactly once per flight, regardless of
                // how many callers coalesced onto it.
                match &outcome {
                    Ok(record) => {
                        cache.set(key, record.clone(), ttl);
                        if let Err(err) = store.upsert(record).await {
                            // Persistence is best-effort; a store problem must
                            // never fail an otherwise-successful resolution.
                            tracing::warn!(key = %key, error = %err, "geo store upsert failed");
                        }
                        breaker.record_success(&endpoint);
                    }
                    Err(err) => {
                        breaker.record_failure(&endpoint);
                        tracing::warn!(key = %key, error = %err, "resolution failed");
                    }
                }

                outcome
            })
            .await;

        match outcome {
            Ok(result) => result,
            Err(aborted) => {
                tracing::error!(key = %key, error = %aborted, "in-flight resolution aborted");
                Err(ResolveError::Aborted)
            }
        }
    }

    /// Resolve a batch of keys under the concurrency bulkhead.
    ///
    /// The output preserves input order and length; a failed item becomes
    /// `None` and is logged, never aborting or delaying its neighbours.
    pub async fn resolve_many(&self, raw_keys: &[String]) -> Vec<Option<GeoRecord>> {
        let tasks = raw_keys.iter().map(|raw| async move {
            let _permit = match self.batch_permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => return None, // semaphore closed, shutting down
            };

            match self.resolve(raw).await {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(key = %raw, error = %err, "batch item unresolved");
                    None
                }
            }
        });

        futures::future::join_all(tasks).await
    }

    /// Drop any cached entry for the key. Idempotent; unparseable keys can
    /// never be cached, so they are a silent no-op.
    pub fn invalidate(&self, raw_key: &str) {
        if let Ok(key) = LookupKey::parse(raw_key) {
            self.cache.remove(&key);
        }
    }

    /// Current breaker state for the configured provider.
    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state(self.provider.name())
    }

    /// Number of cached records.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
