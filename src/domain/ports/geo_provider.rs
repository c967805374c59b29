//! Geo Provider Port
//!
//! Defines the interface for the remote enrichment provider.

use crate::domain::entities::GeoRecord;
use async_trait::async_trait;
use std::net::IpAddr;

/// Remote provider that enriches an IP address with geographic attributes.
///
/// This is an outbound port. Implementations may call ip-api.com, ipinfo.io
/// or any comparable service. The provider is slow, rate-limited and
/// occasionally failing; the resolution layer wraps every call in retry,
/// breaker and dedup machinery, so implementations should only classify
/// their failures and never retry internally.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Stable human-readable name of this provider.
    ///
    /// Used to key the circuit breaker and stamped on every record as its
    /// provenance.
    fn name(&self) -> &str;

    /// Fetch the enriched record for an IP address.
    async fn fetch(&self, ip: IpAddr) -> Result<GeoRecord, ProviderError>;
}

/// A provider call failure.
///
/// The variant decides retry policy: transient failures are retried with
/// backoff, permanent ones propagate immediately. Clonable so a single
/// outcome can be broadcast to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request timed out")]
    Timeout,
    #[error("provider rate limited the request")]
    RateLimited,
    #[error("provider connection failed: {0}")]
    Connection(String),
    #[error("provider returned HTTP status {0}")]
    Status(u16),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    #[error("provider returned a malformed payload: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether retrying this failure can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::RateLimited | Self::Connection(_) => true,
            Self::Status(code) => *code >= 500,
            Self::Rejected(_) | Self::Malformed(_) => false,
        }
    }
}
