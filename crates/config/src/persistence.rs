//! Reading and writing `config.toml`
//!
//! Saves stage the new contents in a temporary file next to the target
//! and rename it into place. The replaced file is kept as `config.toml.bak`.

use crate::error::join_errors;
use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The config file on disk
pub(crate) struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Where the previous contents go on every save
    pub(crate) fn backup_path(&self) -> PathBuf {
        self.path.with_extension("toml.bak")
    }

    /// Reads the file; a missing file yields the defaults
    ///
    /// Invalid values are logged, not rejected, so a hand-edited file
    /// still loads.
    pub(crate) fn read(&self) -> ConfigResult<Config> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {}; using defaults", self.path.display());
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: self.path.clone(),
            });
        }

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;

        if config.version > CONFIG_VERSION {
            log::warn!(
                "{} is format version {}; this build knows up to {}",
                self.path.display(),
                config.version,
                CONFIG_VERSION
            );
        }
        if let Err(errors) = config.validate() {
            log::warn!("{}: {}", self.path.display(), join_errors(&errors));
        }

        Ok(config)
    }

    /// Validates `config` and replaces the file with it
    pub(crate) fn write(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        let contents = toml::to_string_pretty(config)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| write_error(dir, source))?;

        if self.path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup).map_err(|source| write_error(&backup, source))?;
            log::debug!("Kept previous config as {}", backup.display());
        }

        let mut staged = NamedTempFile::new_in(dir).map_err(|source| write_error(dir, source))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|()| staged.flush())
            .map_err(|source| write_error(staged.path(), source))?;
        staged
            .persist(&self.path)
            .map_err(|e| write_error(&self.path, e.error))?;

        log::info!("Saved config to {}", self.path.display());
        Ok(())
    }
}

fn write_error(path: &Path, source: io::Error) -> ConfigError {
    ConfigError::Write {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_file() -> (TempDir, ConfigFile) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let file = ConfigFile::new(dir.path().join("config.toml"));
        (dir, file)
    }

    #[test]
    fn test_missing_file_reads_as_default() {
        let (_dir, file) = config_file();
        assert_eq!(file.read().expect("Should read defaults"), Config::default());
        assert!(!file.path().exists());
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, file) = config_file();
        let mut config = Config::default();
        config.sync.remote_url = "http://10.0.0.2:9000".to_string();

        file.write(&config).expect("Should write config");
        assert_eq!(file.read().expect("Should read config"), config);
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let file = ConfigFile::new(dir.path().join("nested").join("config.toml"));

        file.write(&Config::default()).expect("Should write config");
        assert!(file.path().exists());
    }

    #[test]
    fn test_overwrite_keeps_previous_contents() {
        let (_dir, file) = config_file();
        let mut first = Config::default();
        first.sync.max_retries = 3;
        file.write(&first).expect("Should write config");
        assert!(!file.backup_path().exists());

        file.write(&Config::default()).expect("Should write config");
        let kept = fs::read_to_string(file.backup_path()).expect("Should read backup");
        let kept: Config = toml::from_str(&kept).expect("Backup should parse");
        assert_eq!(kept.sync.max_retries, 3);
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        let (_dir, file) = config_file();
        fs::write(file.path(), "this is not valid TOML {{{").expect("Should write file");
        assert!(matches!(file.read(), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_blank_file_is_an_error() {
        let (_dir, file) = config_file();
        fs::write(file.path(), "   \n").expect("Should write file");
        assert!(matches!(file.read(), Err(ConfigError::Empty { .. })));
    }

    #[test]
    fn test_invalid_config_is_not_written() {
        let (_dir, file) = config_file();
        let mut config = Config::default();
        config.sync.backoff_multiplier = 0.0;

        match file.write(&config) {
            Err(ConfigError::Invalid(errors)) => {
                assert!(errors.iter().any(|e| e.field == "sync.backoff_multiplier"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert!(!file.path().exists());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let (_dir, file) = config_file();
        fs::write(file.path(), "[sync]\nmax_retries = 3\n").expect("Should write file");

        let loaded = file.read().expect("Should read partial config");
        assert_eq!(loaded.sync.max_retries, 3);
        assert_eq!(loaded.sync.backoff_initial_ms, 1000);
        assert_eq!(loaded.app, crate::AppConfig::default());
    }
}
