//! Configuration file handling for flatbed.
//!
//! Looks for `.config/flatbed.styx` in the current directory or any parent directory.
//! Command-line flags win over `DATABASE_URL`, which wins over the file.

pub use flatbed_config::Config;

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load configuration from `.config/flatbed.styx`, searching up the directory tree.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| ConfigError::Io(e.to_string()))?;
    load_from(&cwd)
}

/// Load configuration starting from a specific directory.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let config_path = find_config_file(start)?;
    let content =
        std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io(e.to_string()))?;

    let config: Config =
        facet_styx::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

    Ok((config, config_path))
}

/// Find `.config/flatbed.styx` by searching up the directory tree.
fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".config/flatbed.styx");
        if config_path.exists() {
            return Ok(config_path);
        }

        if !current.pop() {
            return Err(ConfigError::NotFound);
        }
    }
}

/// Directory holding `.config/`.
fn project_root(config_path: &Path) -> Option<&Path> {
    config_path.parent()?.parent()
}

/// Everything a command needs, after merging flags, environment and file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub schema: PathBuf,
    pub database_url: Option<String>,
    pub connect_timeout: Duration,
    pub skip_constraints: Vec<String>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub schema: Option<String>,
    pub database_url: Option<String>,
    pub env_database_url: Option<String>,
}

impl Settings {
    /// Resolve settings from the current directory.
    ///
    /// A missing config file is fine as long as the flags cover what's needed.
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        match load() {
            Ok((config, path)) => {
                let root = project_root(&path).unwrap_or(Path::new("."));
                Self::merge(config, root, overrides)
            }
            Err(ConfigError::NotFound) => Self::merge(Config::default(), Path::new("."), overrides),
            Err(e) => Err(e),
        }
    }

    /// Merge a loaded config with overrides. File paths are relative to `root`.
    pub fn merge(config: Config, root: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        let schema = match (overrides.schema, &config.schema) {
            (Some(flag), _) => PathBuf::from(flag),
            (None, Some(path)) => root.join(path),
            (None, None) => return Err(ConfigError::MissingSchema),
        };

        let database_url = overrides
            .database_url
            .or(overrides.env_database_url)
            .or_else(|| config.database_url.clone());

        Ok(Self {
            schema,
            database_url,
            connect_timeout: config.connect_timeout(),
            skip_constraints: config.skip_constraints().to_vec(),
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingDatabaseUrl)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// No `.config/flatbed.styx` found in any parent directory
    NotFound,
    /// I/O error reading the file
    Io(String),
    /// Parse error in the Styx file
    Parse(String),
    /// Neither `--schema` nor the config file names a schema
    MissingSchema,
    /// No connection string anywhere
    MissingDatabaseUrl,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound => {
                write!(
                    f,
                    "No .config/flatbed.styx found in current directory or any parent"
                )
            }
            ConfigError::Io(e) => write!(f, "Failed to read .config/flatbed.styx: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse .config/flatbed.styx: {}", e),
            ConfigError::MissingSchema => write!(
                f,
                "No schema given: pass --schema or set `schema` in .config/flatbed.styx"
            ),
            ConfigError::MissingDatabaseUrl => write!(
                f,
                "No database given: pass --database-url, set DATABASE_URL, or set `database-url` in .config/flatbed.styx"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn demos() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos")
    }

    #[test]
    fn finds_config_in_parent_directory() {
        let (config, path) = load_from(&demos().join(".config")).unwrap();
        assert!(path.ends_with(".config/flatbed.styx"));
        assert_eq!(config.schema.as_deref(), Some("flatbed.styx"));
        assert_eq!(project_root(&path), Some(demos().as_path()));
    }

    #[test]
    fn schema_is_relative_to_project_root() {
        let config = Config {
            schema: Some("schema/app.styx".to_string()),
            ..Default::default()
        };
        let settings = Settings::merge(config, Path::new("/srv/app"), Overrides::default()).unwrap();
        assert_eq!(settings.schema, PathBuf::from("/srv/app/schema/app.styx"));
        assert!(settings.require_database_url().is_err());
    }

    #[test]
    fn flags_beat_environment_beat_file() {
        let config = Config {
            schema: Some("flatbed.styx".to_string()),
            database_url: Some("postgres://file".to_string()),
            ..Default::default()
        };

        let both = Overrides {
            database_url: Some("postgres://flag".to_string()),
            env_database_url: Some("postgres://env".to_string()),
            ..Default::default()
        };
        let settings = Settings::merge(config.clone(), Path::new("."), both).unwrap();
        assert_eq!(settings.require_database_url().unwrap(), "postgres://flag");

        let env_only = Overrides {
            env_database_url: Some("postgres://env".to_string()),
            ..Default::default()
        };
        let settings = Settings::merge(config.clone(), Path::new("."), env_only).unwrap();
        assert_eq!(settings.require_database_url().unwrap(), "postgres://env");

        let settings = Settings::merge(config, Path::new("."), Overrides::default()).unwrap();
        assert_eq!(settings.require_database_url().unwrap(), "postgres://file");
    }

    #[test]
    fn schema_is_required() {
        let err = Settings::merge(Config::default(), Path::new("."), Overrides::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSchema));
    }
}
