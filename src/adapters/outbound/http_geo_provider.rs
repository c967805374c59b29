//! HTTP Geo Provider
//!
//! Implements GeoProvider against an ip-api.com style JSON endpoint.

use crate::domain::entities::GeoRecord;
use crate::domain::ports::{GeoProvider, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;

/// JSON payload of an ip-api.com style lookup.
///
/// Failure responses carry `status: "fail"` plus a message and omit the
/// geographic fields, so everything beyond `status` is optional.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: Option<String>,
    message: Option<String>,
    country: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
}

/// Remote geo provider speaking the ip-api.com JSON contract.
///
/// Does no retrying of its own - it only classifies failures so the
/// retry layer can decide. The per-attempt timeout also lives upstream.
pub struct HttpGeoProvider {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpGeoProvider {
    /// Create a provider for the given endpoint.
    ///
    /// `base_url` is the lookup prefix, e.g. `http://ip-api.com/json`;
    /// the IP is appended as a path segment.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("georesolve/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            client,
        })
    }

    fn lookup_url(&self, ip: IpAddr) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), ip)
    }

    fn classify_transport(err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            // connect failures, resets, decode-level transport errors
            ProviderError::Connection(err.to_string())
        }
    }
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, ip: IpAddr) -> Result<GeoRecord, ProviderError> {
        let url = self.lookup_url(ip);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        if status.is_client_error() {
            return Err(ProviderError::Rejected(format!("HTTP status {}", status)));
        }

        let payload: LookupResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if payload.status.as_deref() == Some("fail") {
            let message = payload
                .message
                .unwrap_or_else(|| "unspecified provider failure".to_string());
            return Err(ProviderError::Rejected(message));
        }

        // Missing mandatory fields surface as empty strings here; the
        // orchestrator's record validation decides whether that is fatal.
        Ok(GeoRecord {
            ip,
            country: payload.country.unwrap_or_default(),
            country_code: payload.country_code.unwrap_or_default(),
            region: payload.region_name,
            city: payload.city,
            latitude: payload.lat.unwrap_or_default(),
            longitude: payload.lon.unwrap_or_default(),
            timezone: payload.timezone,
            provider: self.name.clone(),
        })
    }
}
