//! Integration tests for HttpGeoProvider with Wiremock
//!
//! Verifies payload parsing and the mapping of HTTP failures onto the
//! provider error taxonomy the retry layer branches on.

use georesolve::{GeoProvider, HttpGeoProvider, ProviderError};
use std::net::{IpAddr, Ipv4Addr};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, last))
}

#[tokio::test]
async fn successful_lookup_builds_complete_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "country": "United States",
            "countryCode": "US",
            "regionName": "California",
            "city": "Mountain View",
            "lat": 37.386,
            "lon": -122.0838,
            "timezone": "America/Los_Angeles",
            "query": "8.8.8.8"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let record = provider.fetch(ip(8)).await.unwrap();

    assert_eq!(record.country_code, "US");
    assert_eq!(record.country, "United States");
    assert_eq!(record.region.as_deref(), Some("California"));
    assert_eq!(record.city.as_deref(), Some("Mountain View"));
    assert_eq!(record.provider, "ip-api");
    assert!(record.validate().is_ok());
}

#[tokio::test]
async fn fail_status_maps_to_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "fail",
            "message": "reserved range",
            "query": "8.8.8.1"
        })))
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let err = provider.fetch(ip(1)).await.unwrap_err();

    assert_eq!(err, ProviderError::Rejected("reserved range".to_string()));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn rate_limit_maps_to_transient() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.2"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let err = provider.fetch(ip(2)).await.unwrap_err();

    assert_eq!(err, ProviderError::RateLimited);
    assert!(err.is_transient());
}

#[tokio::test]
async fn server_error_maps_to_transient_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.3"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let err = provider.fetch(ip(3)).await.unwrap_err();

    assert_eq!(err, ProviderError::Status(503));
    assert!(err.is_transient());
}

#[tokio::test]
async fn client_error_maps_to_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.4"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let err = provider.fetch(ip(4)).await.unwrap_err();

    assert!(matches!(err, ProviderError::Rejected(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn non_json_body_maps_to_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/8.8.8.5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let err = provider.fetch(ip(5)).await.unwrap_err();

    assert!(matches!(err, ProviderError::Malformed(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn incomplete_success_payload_fails_record_validation() {
    let server = MockServer::start().await;

    // success without countryCode: the adapter returns the record,
    // mandatory-field validation upstream decides it is unusable
    Mock::given(method("GET"))
        .and(path("/json/8.8.8.6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "country": "United States",
            "lat": 37.0,
            "lon": -122.0
        })))
        .mount(&server)
        .await;

    let provider = HttpGeoProvider::new("ip-api", format!("{}/json", server.uri())).unwrap();
    let record = provider.fetch(ip(6)).await.unwrap();

    assert!(record.validate().is_err());
}

#[tokio::test]
async fn unreachable_endpoint_maps_to_connection_error() {
    // nothing listens on this port
    let provider = HttpGeoProvider::new("ip-api", "http://127.0.0.1:1/json").unwrap();
    let err = provider.fetch(ip(7)).await.unwrap_err();

    assert!(matches!(err, ProviderError::Connection(_)));
    assert!(err.is_transient());
}
