use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use crate::cache::SNAPSHOT_FILE_NAME;
use crate::models::SetOrder;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".lyric-sets";
/// Overrides the data directory entirely when set.
pub const HOME_ENV: &str = "LYRIC_SETS_HOME";
/// Optional settings file inside the data directory.
const CONFIG_FILE_NAME: &str = "config.toml";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "sets.sqlite";

/// User-tunable settings. Every key is optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite database; relative paths resolve against the data directory.
    pub database: PathBuf,
    /// Local snapshot file; relative paths resolve against the data directory.
    pub snapshot: PathBuf,
    /// Persisted order the set list is loaded in.
    pub list_order: SetOrder,
    /// Quiet time before an edited set title is saved.
    pub autosave_quiet_ms: u64,
    /// Default tracing filter; `RUST_LOG` wins when present.
    pub log_filter: String,
    #[serde(skip)]
    data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DB_FILE_NAME),
            snapshot: PathBuf::from(SNAPSHOT_FILE_NAME),
            list_order: SetOrder::Position,
            autosave_quiet_ms: 800,
            log_filter: "info".to_string(),
            data_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Read `config.toml` from the data directory (or `explicit`, which must
    /// exist). A missing default file means defaults.
    pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => data_dir.join(CONFIG_FILE_NAME),
        };

        let mut config = if explicit.is_some() || path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Self::parse(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };

        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        Ok(config)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn autosave_quiet(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }
}

/// Resolve the data directory: `$LYRIC_SETS_HOME`, else `~/.lyric-sets`.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(home) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn keys_override_defaults() {
        let config = Config::parse(
            r#"
            list_order = "created"
            autosave_quiet_ms = 250
            database = "/srv/sets.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.list_order, SetOrder::Created);
        assert_eq!(config.autosave_quiet(), Duration::from_millis(250));
        assert_eq!(config.snapshot, PathBuf::from(SNAPSHOT_FILE_NAME));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::parse("colour = \"red\"").is_err());
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "database = \"/abs/sets.db\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/abs/sets.db"));
        assert_eq!(config.snapshot_path(), dir.path().join(SNAPSHOT_FILE_NAME));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(dir.path(), Some(&missing)).is_err());
    }
}
