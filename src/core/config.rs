//! Configuration for the studio backend.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::errors::{StudioError, StudioResult};

/// Bind address variable.
pub const HOST_ENV: &str = "LAMBECK_HOST";
/// Bind port variable.
pub const PORT_ENV: &str = "LAMBECK_PORT";
/// External database connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
/// Local database file, used when no connection string is set.
pub const DB_PATH_ENV: &str = "LAMBECK_DB_PATH";
/// Static asset directory.
pub const STATIC_DIR_ENV: &str = "LAMBECK_STATIC_DIR";
/// Directory scanned for model files.
pub const MODELS_DIR_ENV: &str = "LAMBECK_MODELS_DIR";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StudioConfig {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Model management settings.
    pub models: ModelConfig,
}

impl StudioConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> StudioResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F) -> StudioResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup(HOST_ENV) {
            config.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|_| StudioError::InvalidConfig(format!("{PORT_ENV} must be a port number, got {port:?}")))?;
        }
        if let Some(dir) = lookup(STATIC_DIR_ENV) {
            config.server.static_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(MODELS_DIR_ENV) {
            config.models.models_dir = PathBuf::from(dir);
        }

        config.storage = match lookup(DATABASE_URL_ENV) {
            Some(url) => StorageConfig::from_connection_string(&url)?,
            None => lookup(DB_PATH_ENV).map_or_else(StorageConfig::default, |path| StorageConfig {
                location: DatabaseLocation::File(PathBuf::from(path)),
            }),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> StudioResult<()> {
        if self.server.port == 0 {
            return Err(StudioError::InvalidConfig("server.port must be > 0".to_string()));
        }

        self.server.socket_addr()?;

        if matches!(&self.storage.location, DatabaseLocation::File(path) if path.as_os_str().is_empty()) {
            return Err(StudioError::InvalidConfig(
                "storage path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Directory holding the single-page UI.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ServerConfig {
    /// Resolve the bind address.
    ///
    /// # Errors
    /// Returns an error if `host` is not an IP address.
    pub fn socket_addr(&self) -> StudioResult<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| StudioError::InvalidConfig(format!("server.host is not an IP address: {}", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Where the relational database lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// File-backed `SQLite` database.
    File(PathBuf),
    /// Private in-memory database, lost on shutdown.
    InMemory,
}

/// Storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database location.
    pub location: DatabaseLocation,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: DatabaseLocation::File(PathBuf::from("lambeck.db")),
        }
    }
}

impl StorageConfig {
    /// In-memory storage, used by tests and throwaway runs.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::InMemory,
        }
    }

    /// Interpret a connection string.
    ///
    /// Accepts `sqlite::memory:`, `:memory:`, `sqlite://<path>`, `sqlite:<path>`
    /// and bare file paths.
    ///
    /// # Errors
    /// Returns an error for empty strings and non-`sqlite` URL schemes.
    pub fn from_connection_string(raw: &str) -> StudioResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StudioError::InvalidConfig(format!("{DATABASE_URL_ENV} is empty")));
        }
        if raw == ":memory:" || raw == "sqlite::memory:" {
            return Ok(Self::in_memory());
        }

        // Bare paths do not parse as URLs.
        let scheme = Url::parse(raw).ok().map(|url| url.scheme().to_string());
        if let Some(scheme) = scheme.filter(|s| s != "sqlite") {
            return Err(StudioError::InvalidConfig(format!(
                "unsupported database scheme: {scheme}"
            )));
        }

        let path = raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
            .unwrap_or(raw);
        if path.is_empty() {
            return Err(StudioError::InvalidConfig(format!(
                "{DATABASE_URL_ENV} has no database path"
            )));
        }

        Ok(Self {
            location: DatabaseLocation::File(PathBuf::from(path)),
        })
    }
}

/// Model management settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory scanned for `.gguf` files.
    pub models_dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StudioConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.storage.location,
            DatabaseLocation::File(PathBuf::from("lambeck.db"))
        );
    }

    #[test]
    fn test_overrides() {
        let config = StudioConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "9001"),
            (HOST_ENV, "127.0.0.1"),
            (DB_PATH_ENV, "/tmp/studio.db"),
            (MODELS_DIR_ENV, "/models"),
        ]))
        .unwrap();
        assert_eq!(config.server.socket_addr().unwrap().to_string(), "127.0.0.1:9001");
        assert_eq!(
            config.storage.location,
            DatabaseLocation::File(PathBuf::from("/tmp/studio.db"))
        );
        assert_eq!(config.models.models_dir, PathBuf::from("/models"));
    }

    #[test]
    fn test_database_url_wins_over_path() {
        let config = StudioConfig::from_lookup(lookup_from(&[
            (DATABASE_URL_ENV, "sqlite::memory:"),
            (DB_PATH_ENV, "ignored.db"),
        ]))
        .unwrap();
        assert_eq!(config.storage.location, DatabaseLocation::InMemory);
    }

    #[test]
    fn test_connection_strings() {
        let absolute = StorageConfig::from_connection_string("sqlite:///var/lib/lambeck.db").unwrap();
        assert_eq!(
            absolute.location,
            DatabaseLocation::File(PathBuf::from("/var/lib/lambeck.db"))
        );

        let relative = StorageConfig::from_connection_string("sqlite:data.db").unwrap();
        assert_eq!(relative.location, DatabaseLocation::File(PathBuf::from("data.db")));

        let bare = StorageConfig::from_connection_string("chat.db").unwrap();
        assert_eq!(bare.location, DatabaseLocation::File(PathBuf::from("chat.db")));
    }

    #[test]
    fn test_rejects_foreign_schemes() {
        let err = StorageConfig::from_connection_string("postgres://localhost/db").unwrap_err();
        assert!(matches!(err, StudioError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(StudioConfig::from_lookup(lookup_from(&[(PORT_ENV, "http")])).is_err());
        assert!(StudioConfig::from_lookup(lookup_from(&[(PORT_ENV, "0")])).is_err());
    }

    #[test]
    fn test_rejects_bad_host() {
        assert!(StudioConfig::from_lookup(lookup_from(&[(HOST_ENV, "localhost")])).is_err());
    }
}
