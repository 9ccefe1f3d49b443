//! Layered configuration for prsync.
//!
//! Values are resolved from, in increasing order of precedence:
//! 1. built-in defaults,
//! 2. an optional configuration file (TOML, YAML or JSON, chosen by
//!    extension),
//! 3. `PRSYNC_`-prefixed environment variables, with `__` separating nested
//!    keys (`PRSYNC_SNAPSHOT__BACKEND=sqlite`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "PRSYNC_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds during which cached data is served without any fetch.
    pub freshness: u64,
    /// Seconds after which cached data no longer counts as data.
    pub staleness: u64,
    /// Seconds to wait for the remote before giving up; `0` waits forever.
    pub fetch_timeout: u64,
    /// Prefix of every snapshot storage key.
    pub namespace: String,
    pub snapshot: SnapshotConfig,
    pub github: GithubConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            freshness: 5 * 60,
            staleness: 30 * 60,
            fetch_timeout: 30,
            namespace: "prsync".to_string(),
            snapshot: SnapshotConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub backend: Backend,
    /// Directory (for [`Backend::Directory`]) or database file (for
    /// [`Backend::Sqlite`]). Defaults to the platform data directory.
    pub path: Option<PathBuf>,
    /// Read snapshots but never write or remove them.
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Nothing survives the process.
    Memory,
    /// One JSON file per collection.
    #[default]
    Directory,
    /// A single SQLite database.
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Path to the `gh` executable; looked up on `PATH` when unset.
    pub executable: Option<PathBuf>,
    /// Maximum number of pull requests fetched per repository.
    pub limit: u32,
}
impl Default for GithubConfig {
    fn default() -> Self {
        Self { executable: None, limit: 100 }
    }
}

impl Config {
    /// Load and validate configuration from defaults, `file` (if any) and the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = Self::figment(file)?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Defaults merged with `file`, without the environment layer.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let Some(path) = file else {
            return Ok(figment);
        };
        tracing::debug!(file = %path.display(), "Loading configuration file");
        if !path.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        Ok(match path.extension().and_then(OsStr::to_str) {
            Some("toml") => figment.merge(Toml::file_exact(path)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
            Some("json") => figment.merge(Json::file_exact(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|err| exn::Exn::from(ErrorKind::Invalid(err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.freshness > self.staleness {
            exn::bail!(ErrorKind::Validation("freshness must not exceed staleness"));
        }
        if self.namespace.trim().is_empty() {
            exn::bail!(ErrorKind::Validation("namespace must not be empty"));
        }
        if self.github.limit == 0 {
            exn::bail!(ErrorKind::Validation("github.limit must be at least 1"));
        }
        Ok(())
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness)
    }

    /// `None` when fetches may run forever.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout > 0).then(|| Duration::from_secs(self.fetch_timeout))
    }

    /// Where the snapshot backend keeps its data: the configured path, or a
    /// backend-specific location in the platform data directory. `None` for
    /// the memory backend.
    pub fn snapshot_path(&self) -> Result<Option<PathBuf>> {
        if self.snapshot.backend == Backend::Memory {
            return Ok(None);
        }
        if let Some(path) = &self.snapshot.path {
            return Ok(Some(path.clone()));
        }
        let dirs = ProjectDirs::from("", "", "prsync").ok_or_else(|| exn::Exn::from(ErrorKind::NoDataDir))?;
        let file = match self.snapshot.backend {
            Backend::Sqlite => "snapshots.sqlite3",
            _ => "snapshots",
        };
        Ok(Some(dirs.data_dir().join(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn load_file(path: &Path) -> Result<Config> {
        Config::from_figment(&Config::figment(Some(path))?)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::from_figment(&Config::figment(None).unwrap()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.freshness(), Duration::from_secs(300));
        assert_eq!(config.staleness(), Duration::from_secs(1800));
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.snapshot.backend, Backend::Directory);
    }

    #[rstest]
    #[case(
        "config.toml",
        "freshness = 60\nstaleness = 600\n\n[snapshot]\nbackend = \"sqlite\"\npath = \"/var/lib/prsync.db\"\n"
    )]
    #[case(
        "config.yaml",
        "freshness: 60\nstaleness: 600\nsnapshot:\n  backend: sqlite\n  path: /var/lib/prsync.db\n"
    )]
    #[case(
        "config.json",
        r#"{"freshness": 60, "staleness": 600, "snapshot": {"backend": "sqlite", "path": "/var/lib/prsync.db"}}"#
    )]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        let dir = TempDir::new().unwrap();
        let config = load_file(&write(&dir, name, contents)).unwrap();
        assert_eq!(config.freshness, 60);
        assert_eq!(config.staleness, 600);
        assert_eq!(config.snapshot.backend, Backend::Sqlite);
        assert_eq!(config.snapshot_path().unwrap(), Some(PathBuf::from("/var/lib/prsync.db")));
        // Untouched values keep their defaults.
        assert_eq!(config.namespace, "prsync");
        assert_eq!(config.github.limit, 100);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let err = load_file(&write(&dir, "config.ini", "freshness=1")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let dir = TempDir::new().unwrap();
        let err = load_file(&write(&dir, "config.toml", "freshness = \"soon\"")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[rstest]
    #[case("freshness = 600\nstaleness = 60")]
    #[case("namespace = \"  \"")]
    #[case("[github]\nlimit = 0")]
    fn test_validation(#[case] contents: &str) {
        let dir = TempDir::new().unwrap();
        let err = load_file(&write(&dir, "config.toml", contents)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Validation(_)));
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = Config { fetch_timeout: 0, ..Config::default() };
        assert_eq!(config.fetch_timeout(), None);
    }

    #[test]
    fn test_memory_backend_has_no_path() {
        let config = Config {
            snapshot: SnapshotConfig { backend: Backend::Memory, path: Some("/ignored".into()), read_only: false },
            ..Config::default()
        };
        assert_eq!(config.snapshot_path().unwrap(), None);
    }

    #[test]
    fn test_later_layers_win() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.toml", "freshness = 60");
        let figment = Config::figment(Some(&path)).unwrap().merge(("freshness", 120));
        assert_eq!(Config::from_figment(&figment).unwrap().freshness, 120);
    }
}
