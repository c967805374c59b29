//! Domain Entities - Core business objects
//!
//! The lookup key and the enriched record the resolution layer produces.
//! They have no external dependencies and contain only business logic.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A validated, canonicalized lookup key.
///
/// Wraps the parsed IP address so the rest of the system never sees a raw,
/// unvalidated string. Construction is the only validation point: an invalid
/// key is rejected before cache, breaker or provider are touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupKey(IpAddr);

impl LookupKey {
    /// Parse a raw key into a canonical lookup key.
    ///
    /// Leading/trailing whitespace is ignored. Empty or syntactically
    /// invalid input is rejected.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }
        trimmed
            .parse::<IpAddr>()
            .map(Self)
            .map_err(|_| KeyError::NotAnIp(trimmed.to_string()))
    }

    /// The canonical IP address behind this key.
    pub fn ip(&self) -> IpAddr {
        self.0
    }

    /// Whether this address is non-routable (private, loopback, link-local
    /// or unspecified). Such addresses are classified locally and never sent
    /// to the provider.
    pub fn is_private(&self) -> bool {
        match self.0 {
            IpAddr::V4(v4) => {
                v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => {
                let seg = v6.segments();
                v6.is_loopback()
                    || v6.is_unspecified()
                    // fc00::/7 unique local
                    || (seg[0] & 0xfe00) == 0xfc00
                    // fe80::/10 link local
                    || (seg[0] & 0xffc0) == 0xfe80
            }
        }
    }
}

impl std::fmt::Display for LookupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a raw key was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("lookup key is empty")]
    Empty,
    #[error("lookup key is not a valid IP address: {0:?}")]
    NotAnIp(String),
}

/// Geographic attributes resolved for an IP address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// The address this record describes
    pub ip: IpAddr,
    /// Country name
    pub country: String,
    /// Country code (ISO 3166-1 alpha-2)
    pub country_code: String,
    /// Subdivision / state name, if known
    pub region: Option<String>,
    /// City name, if known
    pub city: Option<String>,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// IANA timezone name, if known
    pub timezone: Option<String>,
    /// Name of the provider that produced this record
    pub provider: String,
}

impl GeoRecord {
    /// Check that all mandatory attributes are present and in range.
    ///
    /// A record failing this is treated as a resolution failure, not a
    /// success: a provider that returns structurally incomplete payloads is
    /// as unhealthy as one that times out.
    pub fn validate(&self) -> Result<(), RecordIssue> {
        if self.country.trim().is_empty() {
            return Err(RecordIssue::MissingCountry);
        }
        if self.country_code.trim().is_empty() {
            return Err(RecordIssue::MissingCountryCode);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(RecordIssue::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(RecordIssue::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }

    /// Synthetic record for a non-routable address.
    ///
    /// Private and loopback ranges carry no geographic information, so they
    /// are classified locally instead of being sent to the provider.
    pub fn private_network(ip: IpAddr) -> Self {
        Self {
            ip,
            country: "Unknown".to_string(),
            country_code: "XX".to_string(),
            region: Some("Private Network".to_string()),
            city: None,
            latitude: 0.0,
            longitude: 0.0,
            timezone: None,
            provider: "local".to_string(),
        }
    }
}

/// A mandatory attribute missing or out of range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordIssue {
    #[error("country is empty")]
    MissingCountry,
    #[error("country code is empty")]
    MissingCountryCode,
    #[error("latitude {0} is out of range")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is out of range")]
    LongitudeOutOfRange(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn sample_record() -> GeoRecord {
        GeoRecord {
            ip: IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            country: "United States".to_string(),
            country_code: "US".to_string(),
            region: Some("California".to_string()),
            city: Some("Mountain View".to_string()),
            latitude: 37.386,
            longitude: -122.0838,
            timezone: Some("America/Los_Angeles".to_string()),
            provider: "test".to_string(),
        }
    }

    // ===== LookupKey Tests =====

    #[test]
    fn test_parse_valid_ipv4() {
        let key = LookupKey::parse("8.8.8.8").unwrap();
        assert_eq!(key.ip(), IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn test_parse_valid_ipv6() {
        let key = LookupKey::parse("2001:4860:4860::8888").unwrap();
        assert!(matches!(key.ip(), IpAddr::V6(_)));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let key = LookupKey::parse("  1.1.1.1\n").unwrap();
        assert_eq!(key.to_string(), "1.1.1.1");
    }

    #[test]
    fn test_parse_empty_rejected() {
        assert_eq!(LookupKey::parse(""), Err(KeyError::Empty));
        assert_eq!(LookupKey::parse("   "), Err(KeyError::Empty));
    }

    #[test]
    fn test_parse_garbage_rejected() {
        assert!(matches!(
            LookupKey::parse("not-an-ip"),
            Err(KeyError::NotAnIp(_))
        ));
        assert!(matches!(
            LookupKey::parse("999.1.1.1"),
            Err(KeyError::NotAnIp(_))
        ));
    }

    #[test]
    fn test_private_ranges_ipv4() {
        for raw in [
            "10.0.0.1",
            "172.16.0.1",
            "192.168.1.1",
            "127.0.0.1",
            "169.254.1.1",
            "0.0.0.0",
        ] {
            assert!(LookupKey::parse(raw).unwrap().is_private(), "{raw}");
        }
    }

    #[test]
    fn test_public_ipv4_not_private() {
        for raw in ["8.8.8.8", "1.1.1.1", "172.32.0.1"] {
            assert!(!LookupKey::parse(raw).unwrap().is_private(), "{raw}");
        }
    }

    #[test]
    fn test_private_ranges_ipv6() {
        for raw in ["::1", "fc00::1", "fd12:3456::1", "fe80::1"] {
            assert!(LookupKey::parse(raw).unwrap().is_private(), "{raw}");
        }
        assert!(!LookupKey::parse("2001:4860:4860::8888")
            .unwrap()
            .is_private());
    }

    #[test]
    fn test_key_hash_consistency() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(LookupKey::parse("8.8.8.8").unwrap());
        assert!(set.contains(&LookupKey::parse(" 8.8.8.8 ").unwrap()));
    }

    // ===== GeoRecord Tests =====

    #[test]
    fn test_validate_complete_record() {
        assert!(sample_record().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_country() {
        let mut record = sample_record();
        record.country = "  ".to_string();
        assert_eq!(record.validate(), Err(RecordIssue::MissingCountry));
    }

    #[test]
    fn test_validate_missing_country_code() {
        let mut record = sample_record();
        record.country_code = String::new();
        assert_eq!(record.validate(), Err(RecordIssue::MissingCountryCode));
    }

    #[test]
    fn test_validate_latitude_out_of_range() {
        let mut record = sample_record();
        record.latitude = 91.0;
        assert!(matches!(
            record.validate(),
            Err(RecordIssue::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_longitude_out_of_range() {
        let mut record = sample_record();
        record.longitude = -180.5;
        assert!(matches!(
            record.validate(),
            Err(RecordIssue::LongitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_private_network_record_is_valid() {
        let record = GeoRecord::private_network(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(record.validate().is_ok());
        assert_eq!(record.country_code, "XX");
        assert_eq!(record.provider, "local");
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: GeoRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_private_network_ipv6() {
        let record = GeoRecord::private_network(IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1)));
        assert_eq!(record.ip.to_string(), "::1");
    }
}
