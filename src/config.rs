use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub query: QueryConfig,
    /// Bearer secret guarding every protected route. Protected routes answer
    /// 500 while this is unset.
    pub api_token: Option<String>,
    /// Maximum upload size in bytes
    pub max_upload_size: usize,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Redb,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory holding the database file
    pub data_dir: PathBuf,
    /// Parent directory of the per-dispatch scratch directories
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Deadline for a single engine call; `None` waits as long as the engine takes.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    /// Upper bound on `file_ids` per query; `None` accepts any number.
    pub max_files: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Redb,
            data_dir: PathBuf::from("./data"),
            scratch_dir: std::env::temp_dir().join("csv-agent"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_address = match var("BIND_ADDRESS") {
            Some(addr) => addr,
            None => {
                let port: u16 = parse_var(&var, "PORT")?.unwrap_or(5000);
                format!("0.0.0.0:{port}")
            }
        };

        let backend = match var("STORAGE_BACKEND")
            .unwrap_or_else(|| "redb".to_string())
            .to_lowercase()
            .as_str()
        {
            "redb" => StorageBackend::Redb,
            "sqlite" => StorageBackend::Sqlite,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "STORAGE_BACKEND must be 'redb' or 'sqlite', got '{other}'"
                )))
            }
        };

        let defaults = StorageConfig::default();
        let data_dir = var("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir);
        let scratch_dir = var("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.scratch_dir);

        let max_upload_size = parse_var(&var, "MAX_UPLOAD_SIZE")?.unwrap_or(50 * 1024 * 1024); // 50MB

        let engine_defaults = EngineConfig::default();
        let timeout = parse_var::<u64, _>(&var, "ENGINE_TIMEOUT_SECS")?.map(Duration::from_secs);

        let config = Config {
            server: ServerConfig { bind_address },
            storage: StorageConfig {
                backend,
                data_dir,
                scratch_dir,
            },
            engine: EngineConfig {
                api_key: var("OPENAI_API_KEY"),
                base_url: var("OPENAI_BASE_URL").unwrap_or(engine_defaults.base_url),
                model: var("OPENAI_MODEL").unwrap_or(engine_defaults.model),
                timeout,
            },
            query: QueryConfig {
                max_files: parse_var(&var, "QUERY_MAX_FILES")?,
            },
            api_token: var("API_TOKEN"),
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.engine.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "OPENAI_MODEL cannot be empty".to_string(),
            ));
        }

        if self.engine.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationError(
                "ENGINE_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.query.max_files == Some(0) {
            return Err(ConfigError::ValidationError(
                "QUERY_MAX_FILES must be greater than 0".to_string(),
            ));
        }

        if self.api_token.is_none() {
            tracing::warn!("API_TOKEN is not set. Protected routes will answer 500.");
        }

        Ok(())
    }

    /// The SQLite database file for this configuration.
    pub fn sqlite_path(&self) -> PathBuf {
        self.storage.data_dir.join("csv-agent.sqlite3")
    }
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("{key} must be a non-negative integer, got '{raw}'"))
            })
        })
        .transpose()
}
