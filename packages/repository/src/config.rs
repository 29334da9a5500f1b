//! Repository configuration.
//!
//! Everything is optional: with no configuration at all the repository uses
//! the file-backed store at [`paths::default_reports_path`].
//!
//! Configuration comes either from environment variables
//! ([`RepositoryConfig::from_env`]) or from a TOML file
//! ([`RepositoryConfig::from_toml_file`]) of the same shape:
//!
//! ```toml
//! backend = "document"
//! data_file = "data/reports.json"
//! collection = "reports"
//!
//! [document]
//! project_id = "my-project"
//! emulator_host = "localhost:8080"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::paths;

/// Environment variable selecting the backend strategy.
pub const BACKEND_VAR: &str = "REPORTS_BACKEND";
/// Environment variable overriding the JSON store path.
pub const DATA_FILE_VAR: &str = "REPORTS_FILE";
/// Environment variable overriding the document collection name.
pub const COLLECTION_VAR: &str = "REPORTS_COLLECTION";

/// Default document collection name.
pub const DEFAULT_COLLECTION: &str = "reports";

/// Default Firestore database id.
pub const DEFAULT_DATABASE: &str = "(default)";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The backend name is not one of the known strategies.
    #[error("Unknown report backend: {name}. Use 'memory', 'file', or 'document'.")]
    UnknownBackend {
        /// The rejected name.
        name: String,
    },

    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this shape.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Storage strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Process-local, non-persistent store.
    #[serde(alias = "mem", alias = "ephemeral")]
    Memory,
    /// Single JSON file on disk.
    #[serde(alias = "json")]
    File,
    /// Remote document database.
    #[serde(alias = "firestore")]
    Document,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" | "ephemeral" => Ok(Self::Memory),
            "file" | "json" => Ok(Self::File),
            "document" | "firestore" => Ok(Self::Document),
            _ => Err(ConfigError::UnknownBackend {
                name: s.to_string(),
            }),
        }
    }
}

impl BackendKind {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Document => "document",
        }
    }
}

/// Connection settings for the document-database backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentDbConfig {
    /// Google Cloud project id (`FIRESTORE_PROJECT_ID` or
    /// `GOOGLE_CLOUD_PROJECT`).
    pub project_id: Option<String>,
    /// Firestore database id (`FIRESTORE_DATABASE`).
    pub database: String,
    /// OAuth bearer token (`FIRESTORE_ACCESS_TOKEN`).
    pub access_token: Option<String>,
    /// `host:port` of a Firestore emulator (`FIRESTORE_EMULATOR_HOST`).
    pub emulator_host: Option<String>,
}

impl Default for DocumentDbConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            database: DEFAULT_DATABASE.to_string(),
            access_token: None,
            emulator_host: None,
        }
    }
}

impl DocumentDbConfig {
    /// Whether there is enough configuration to reach a database: a
    /// project id plus either credentials or an emulator.
    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        self.project_id.is_some() && (self.access_token.is_some() || self.emulator_host.is_some())
    }
}

/// Repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Explicit backend strategy. `None` selects the file-backed store.
    pub backend: Option<BackendKind>,
    /// Path of the JSON store used by the file backend.
    pub data_file: PathBuf,
    /// Collection name used by the document backend.
    pub collection: String,
    /// Document-database connection settings.
    pub document: DocumentDbConfig,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: None,
            data_file: paths::default_reports_path(),
            collection: DEFAULT_COLLECTION.to_string(),
            document: DocumentDbConfig::default(),
        }
    }
}

impl RepositoryConfig {
    /// Configuration for the in-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            backend: Some(BackendKind::Memory),
            ..Self::default()
        }
    }

    /// Configuration for the file backend at `path`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Some(BackendKind::File),
            data_file: path.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// Empty variables count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownBackend`] if `REPORTS_BACKEND` names an
    /// unknown strategy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownBackend`] if the backend variable names
    /// an unknown strategy.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let backend = var(BACKEND_VAR)
            .map(|name| name.parse::<BackendKind>())
            .transpose()?;

        Ok(Self {
            backend,
            data_file: var(DATA_FILE_VAR).map_or(defaults.data_file, PathBuf::from),
            collection: var(COLLECTION_VAR).unwrap_or(defaults.collection),
            document: DocumentDbConfig {
                project_id: var("FIRESTORE_PROJECT_ID").or_else(|| var("GOOGLE_CLOUD_PROJECT")),
                database: var("FIRESTORE_DATABASE").unwrap_or(defaults.document.database),
                access_token: var("FIRESTORE_ACCESS_TOKEN"),
                emulator_host: var("FIRESTORE_EMULATOR_HOST"),
            },
        })
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not valid for this
    /// shape.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
