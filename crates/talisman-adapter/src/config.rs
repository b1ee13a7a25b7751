//! Adapter configuration: backend kind plus backend-specific settings.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use talisman_db_postgres::PostgresConfig;

use crate::error::AdapterError;

/// The storage backends a configuration may name.
///
/// This is a closed set: deserializing any other string is a configuration
/// error, raised before a single store operation is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Relational backend (PostgreSQL).
    Postgres,
    /// In-memory backend.
    Memory,
    /// Document-store backend; not compiled into this distribution.
    Mongodb,
    /// Distributed key-value backend; not compiled into this distribution.
    Dynamodb,
}

impl BackendKind {
    /// Returns the configuration name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
            Self::Mongodb => "mongodb",
            Self::Dynamodb => "dynamodb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            "mongodb" => Ok(Self::Mongodb),
            "dynamodb" => Ok(Self::Dynamodb),
            other => Err(AdapterError::config(format!(
                "unknown backend kind '{other}'"
            ))),
        }
    }
}

/// Top-level adapter configuration.
///
/// ```toml
/// backend = "postgres"
///
/// [postgres]
/// host = "db.internal"
/// user = "idp"
/// password = "secret"
/// database = "talisman"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Which backend to initialize.
    pub backend: BackendKind,

    /// Relational backend settings; required when `backend = "postgres"`.
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
}

impl AdapterConfig {
    /// Creates a configuration for the in-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            postgres: None,
        }
    }

    /// Creates a configuration for the relational backend.
    #[must_use]
    pub fn postgres(config: PostgresConfig) -> Self {
        Self {
            backend: BackendKind::Postgres,
            postgres: Some(config),
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed TOML or an unknown
    /// backend kind.
    pub fn from_toml_str(text: &str) -> Result<Self, AdapterError> {
        toml::from_str(text).map_err(|e| AdapterError::config(e.to_string()))
    }

    /// Reads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AdapterError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Applies `TALISMAN_*` environment variable overrides.
    ///
    /// Recognized variables: `TALISMAN_BACKEND`, `TALISMAN_PG_HOST`,
    /// `TALISMAN_PG_PORT`, `TALISMAN_PG_USER`, `TALISMAN_PG_PASSWORD`,
    /// `TALISMAN_PG_DATABASE`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unparsable values.
    pub fn apply_env_overrides(&mut self) -> Result<(), AdapterError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), AdapterError> {
        if let Some(kind) = lookup("TALISMAN_BACKEND") {
            self.backend = kind.parse()?;
        }

        let pg_vars = [
            "TALISMAN_PG_HOST",
            "TALISMAN_PG_PORT",
            "TALISMAN_PG_USER",
            "TALISMAN_PG_PASSWORD",
            "TALISMAN_PG_DATABASE",
        ];
        if pg_vars.into_iter().any(|name| lookup(name).is_some()) {
            let pg = self.postgres.get_or_insert_with(PostgresConfig::default);

            if let Some(host) = lookup("TALISMAN_PG_HOST") {
                pg.host = host;
            }
            if let Some(port) = lookup("TALISMAN_PG_PORT") {
                pg.port = Some(port.parse().map_err(|_| {
                    AdapterError::config(format!("invalid TALISMAN_PG_PORT '{port}'"))
                })?);
            }
            if let Some(user) = lookup("TALISMAN_PG_USER") {
                pg.user = user;
            }
            if let Some(password) = lookup("TALISMAN_PG_PASSWORD") {
                pg.password = password;
            }
            if let Some(database) = lookup("TALISMAN_PG_DATABASE") {
                pg.database = database;
            }
        }

        Ok(())
    }
}
