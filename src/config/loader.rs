//! Configuration loading from disk.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::lines::is_skippable;
use crate::config::parser::parse_config;
use crate::config::schema::ConfigSnapshot;

/// Error type for configuration loading and persistence.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads a whole file. The handle is closed before returning on every path.
pub fn read_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let mut file = File::open(path).map_err(|e| ConfigError::io(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| ConfigError::io(path, e))?;
    Ok(bytes)
}

/// SHA-256 applied twice, hex encoded.
pub fn content_digest(bytes: &[u8]) -> String {
    let first = Sha256::digest(bytes);
    hex::encode(Sha256::digest(first))
}

/// First token of every non-comment line in the blocked-ip file.
pub fn parse_blocked_ips(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !is_skippable(line))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Reads the blocked-ip file; a missing file means nothing is blocked.
pub fn load_blocked_ips(path: &Path) -> Result<Vec<String>, ConfigError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = read_file(path)?;
    Ok(parse_blocked_ips(&String::from_utf8_lossy(&bytes)))
}

/// Raw config bytes together with their digest.
pub struct ConfigSource {
    pub bytes: Vec<u8>,
    pub digest: String,
}

impl ConfigSource {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let bytes = read_file(path)?;
        let digest = content_digest(&bytes);
        Ok(Self { bytes, digest })
    }

    /// Parses the bytes; bookkeeping fields are left for the caller.
    pub fn parse(&self) -> ConfigSnapshot {
        let mut snapshot = parse_config(&String::from_utf8_lossy(&self.bytes));
        snapshot.config_file_last_hash = self.digest.clone();
        snapshot
    }
}
