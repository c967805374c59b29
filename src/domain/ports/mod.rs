mod geo_provider;
mod geo_store;

pub use geo_provider::{GeoProvider, ProviderError};
pub use geo_store::{GeoStore, StoreError};
