//! Geo Store Port
//!
//! Defines the interface for durably recording resolved records.

use crate::domain::entities::GeoRecord;
use async_trait::async_trait;

/// Durable store for resolved records.
///
/// This is an outbound port. The store keeps one row per IP with a
/// monotonically incremented usage counter. Persistence is best-effort:
/// the resolution layer logs store failures and never lets them fail an
/// otherwise-successful resolution.
#[async_trait]
pub trait GeoStore: Send + Sync {
    /// Insert the record, or update the existing row and increment its
    /// usage counter.
    async fn upsert(&self, record: &GeoRecord) -> Result<(), StoreError>;
}

/// A persistence failure. Logged by the caller, never propagated.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store query failed: {0}")]
    Query(String),
}
