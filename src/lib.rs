//! georesolve Library
//!
//! Resilient IP geo-enrichment: TTL caching, request coalescing, a circuit
//! breaker guarding the remote provider, retry with backoff and a bounded
//! batch resolver. This module exposes the components for use in
//! integration tests and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::outbound::{HttpGeoProvider, SqliteGeoStore};
pub use application::{ResolveError, ResolverService};
pub use config::{load_config, ConfigError, ResolverConfig, ServiceConfig};
pub use domain::entities::{GeoRecord, KeyError, LookupKey, RecordIssue};
pub use domain::ports::{GeoProvider, GeoStore, ProviderError, StoreError};
pub use infrastructure::{CircuitBreaker, CircuitState, RetryPolicy, TtlCache};
