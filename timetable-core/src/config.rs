//! YAML settings at `<home>/.timetable/config.yaml`.
//!
//! Every function has two forms: `fn_at(home, …)` with an explicit home
//! (used by tests) and `fn(…)` deriving home from `dirs::home_dir()`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::paths;

/// Hourly, matching how often the upstream schedule site is worth polling.
pub const DEFAULT_INTERVAL_SECS: u64 = 60 * 60;

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds between sync cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Directory holding the snapshot and marker; defaults to `~/.timetable/data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Listing document consumed by the file-backed source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            data_dir: None,
            source: None,
        }
    }
}

impl Settings {
    /// Resolved data directory.
    pub fn data_dir_at(&self, home: &Path) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| paths::default_data_dir_at(home))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Load settings, falling back to defaults when the file does not exist.
pub fn load_at(home: &Path) -> Result<Settings, ConfigError> {
    let path = paths::config_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let settings: Settings =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    settings.validate()?;
    Ok(settings)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, ConfigError> {
    load_at(&home()?)
}

/// Atomically save settings: `.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<PathBuf, ConfigError> {
    settings.validate()?;
    let root = paths::root_at(home);
    std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;

    let path = paths::config_path_at(home);
    let tmp = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, settings)
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_file_missing() {
        let home = TempDir::new().unwrap();
        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.interval_secs, 3600);
        assert_eq!(
            settings.data_dir_at(home.path()),
            home.path().join(".timetable").join("data")
        );
    }

    #[test]
    fn missing_keys_take_defaults() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "source: /srv/listing.yaml\n").unwrap();

        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(settings.source, Some(PathBuf::from("/srv/listing.yaml")));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let home = TempDir::new().unwrap();
        let settings = Settings {
            interval_secs: 0,
            ..Settings::default()
        };
        let err = save_at(home.path(), &settings).expect_err("zero interval");
        assert!(matches!(err, ConfigError::Invalid { key: "interval_secs", .. }));
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let home = TempDir::new().unwrap();
        let path = paths::config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "interval_secs: [not, a, number]\n").unwrap();

        match load_at(home.path()) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
