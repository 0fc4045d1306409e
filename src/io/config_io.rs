use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::io::storage::atomic_write;
use crate::model::config::Config;

pub const CONFIG_FILE: &str = "shoplist.toml";

/// Error type for config I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not parse {CONFIG_FILE}: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not serialize {CONFIG_FILE}: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Read `shoplist.toml` from the data directory. A missing file yields
/// the defaults.
pub fn read_config(data_dir: &Path) -> Result<Config, ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };
    Ok(toml::from_str(&text)?)
}

/// Write the config file, replacing any existing one.
pub fn write_config(data_dir: &Path, config: &Config) -> Result<(), ConfigError> {
    let path = data_dir.join(CONFIG_FILE);
    fs::create_dir_all(data_dir).map_err(|e| ConfigError::WriteError {
        path: data_dir.to_path_buf(),
        source: e,
    })?;
    let text = toml::to_string_pretty(config)?;
    atomic_write(&path, text.as_bytes()).map_err(|e| ConfigError::WriteError { path, source: e })
}
