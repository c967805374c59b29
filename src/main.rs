//! georesolve - Resilient IP Geo-Enrichment
//!
//! This is the composition root that wires the adapters into the
//! resolution service and resolves the IPs given on the command line.

use anyhow::Context;
use georesolve::{load_config, HttpGeoProvider, ResolverService, SqliteGeoStore};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let keys: Vec<String> = std::env::args().skip(1).collect();
    if keys.is_empty() {
        anyhow::bail!("usage: georesolve <ip> [<ip>...]");
    }

    tracing::info!(
        "starting georesolve provider={} url={} db={}",
        cfg.provider_name,
        cfg.provider_url,
        cfg.db_path
    );

    // ===== COMPOSITION ROOT =====

    let provider = Arc::new(
        HttpGeoProvider::new(cfg.provider_name.clone(), cfg.provider_url.clone())
            .context("building geo provider")?,
    );

    let store =
        Arc::new(SqliteGeoStore::open(&cfg.db_path).context("opening geo record store")?);

    let service = ResolverService::new(cfg.resolver.clone(), provider, store)
        .context("constructing resolver service")?;

    let results = service.resolve_many(&keys).await;

    for (key, result) in keys.iter().zip(results) {
        match result {
            Some(record) => println!("{}", serde_json::to_string(&record)?),
            None => println!(
                "{}",
                serde_json::json!({ "ip": key, "error": "unresolved" })
            ),
        }
    }

    Ok(())
}
