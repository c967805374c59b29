mod http_geo_provider;
mod sqlite_geo_store;

pub use http_geo_provider::HttpGeoProvider;
pub use sqlite_geo_store::SqliteGeoStore;
