//! SQLite Geo Store
//!
//! Implements GeoStore using SQLite. Each resolved record is upserted
//! with a usage counter that increments on every repeat resolution.

use crate::domain::entities::GeoRecord;
use crate::domain::ports::{GeoStore, StoreError};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::sync::Arc;

/// SQLite-backed record store.
///
/// The connection lives behind a mutex and all statements run on the
/// blocking pool, keeping the async resolution path free of file I/O.
pub struct SqliteGeoStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGeoStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS geo_records (
                ip           TEXT PRIMARY KEY,
                country      TEXT NOT NULL,
                country_code TEXT NOT NULL,
                region       TEXT,
                city         TEXT,
                latitude     REAL NOT NULL,
                longitude    REAL NOT NULL,
                timezone     TEXT,
                provider     TEXT NOT NULL,
                hits         INTEGER NOT NULL DEFAULT 1,
                last_seen    TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_geo_records_last_seen
                ON geo_records (last_seen);",
        )
    }

    /// Usage counter for an IP, if the row exists.
    pub fn hits(&self, ip: &str) -> Result<Option<u64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT hits FROM geo_records WHERE ip = ?1")?;
        let mut rows = stmt.query(params![ip])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get::<_, i64>(0)? as u64)),
            None => Ok(None),
        }
    }

    /// Total number of persisted records.
    pub fn record_count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM geo_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl GeoStore for SqliteGeoStore {
    async fn upsert(&self, record: &GeoRecord) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let record = record.clone();

        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO geo_records
                     (ip, country, country_code, region, city,
                      latitude, longitude, timezone, provider)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(ip) DO UPDATE SET
                     country = excluded.country,
                     country_code = excluded.country_code,
                     region = excluded.region,
                     city = excluded.city,
                     latitude = excluded.latitude,
                     longitude = excluded.longitude,
                     timezone = excluded.timezone,
                     provider = excluded.provider,
                     hits = geo_records.hits + 1,
                     last_seen = datetime('now')",
                params![
                    record.ip.to_string(),
                    record.country,
                    record.country_code,
                    record.region,
                    record.city,
                    record.latitude,
                    record.longitude,
                    record.timezone,
                    record.provider,
                ],
            )
        })
        .await;

        match result {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(StoreError::Query(e.to_string())),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}
