//! Key/value settings persisted as JSON values.

use std::sync::Arc;

use tokio_rusqlite::Connection;
use tracing::debug;

use crate::core::errors::StudioResult;

use super::types::SettingsMap;
use super::{StoreFuture, json_from_column, json_to_column, now};

/// Settings store trait.
pub trait SettingsStore: Send + Sync {
    /// Read every stored setting.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_all(&self) -> StoreFuture<'_, StudioResult<SettingsMap>>;

    /// Upsert the given settings and return the full mapping afterwards.
    ///
    /// Keys absent from `values` are left untouched.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn update(&self, values: SettingsMap) -> StoreFuture<'_, StudioResult<SettingsMap>>;
}

/// `SQLite` implementation of the settings store.
pub struct SqliteSettingsStore {
    conn: Arc<Connection>,
}

impl SqliteSettingsStore {
    /// Build the store on a shared connection.
    #[must_use]
    pub const fn new(conn: Arc<Connection>) -> Self {
        Self { conn }
    }
}

fn load_all(conn: &rusqlite::Connection) -> rusqlite::Result<SettingsMap> {
    let mut stmt = conn.prepare("SELECT key, value_json FROM settings ORDER BY key")?;
    let rows = stmt
        .query_map([], |row| {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            let value: serde_json::Value = json_from_column(1, &raw)?;
            Ok((key, value))
        })?
        .collect::<Result<SettingsMap, _>>()?;
    Ok(rows)
}

impl SettingsStore for SqliteSettingsStore {
    fn get_all(&self) -> StoreFuture<'_, StudioResult<SettingsMap>> {
        Box::pin(async move {
            let values = self.conn.call(|conn| Ok(load_all(conn)?)).await?;
            Ok(values)
        })
    }

    fn update(&self, values: SettingsMap) -> StoreFuture<'_, StudioResult<SettingsMap>> {
        Box::pin(async move {
            let updated_at = now().timestamp_millis();
            let count = values.len();
            let all = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    {
                        let mut stmt = tx.prepare(
                            "INSERT INTO settings (key, value_json, updated_at)
                             VALUES (?1, ?2, ?3)
                             ON CONFLICT (key) DO UPDATE
                             SET value_json = excluded.value_json,
                                 updated_at = excluded.updated_at",
                        )?;
                        for (key, value) in &values {
                            let raw = json_to_column(value)?;
                            stmt.execute(rusqlite::params![key, raw, updated_at])?;
                        }
                    }
                    let all = load_all(&tx)?;
                    tx.commit()?;
                    Ok(all)
                })
                .await?;
            debug!("Upserted {count} settings");
            Ok(all)
        })
    }
}
