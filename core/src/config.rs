use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding local backup archives and their manifests.
    pub backup_directory: PathBuf,
    pub s3: S3Defaults,
    pub servers: Vec<ServerEntry>,
}

/// Defaults applied to S3 requests that leave a parameter unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Defaults {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub prefix: String,
    pub part_size: u64,
    /// Largest part size a request may ask for. Each upload buffers one part.
    pub max_part_size: u64,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub retry_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: String,
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_directory: PathBuf::from("/var/lib/hangar/backups"),
            s3: S3Defaults::default(),
            servers: Vec::new(),
        }
    }
}

impl Default for S3Defaults {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            path_style: false,
            prefix: String::new(),
            part_size: 16 * MIB,
            max_part_size: 64 * MIB,
            access_key: None,
            secret_key: None,
            retry_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.backup_directory, PathBuf::from("/var/lib/hangar/backups"));
        assert_eq!(config.s3.part_size, 16 * MIB);
        assert_eq!(config.s3.max_part_size, 64 * MIB);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
backup_directory = "/data/backups"

[s3]
region = "eu-central-1"
endpoint = "http://localhost:9000"
path_style = true
part_size = 8388608

[[servers]]
id = "S1"
root = "/srv/S1"
"#,
        )
        .unwrap();

        assert_eq!(config.backup_directory, PathBuf::from("/data/backups"));
        assert_eq!(config.s3.region.as_deref(), Some("eu-central-1"));
        assert!(config.s3.path_style);
        assert_eq!(config.s3.part_size, 8 * MIB);
        assert_eq!(config.s3.retry_attempts, 3);
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].id, "S1");
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let err = Config::from_toml_str("backup_directory = 12").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_load_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.backup_directory = dir.path().join("backups");
        tokio::fs::write(&path, config.to_toml_string().unwrap()).await.unwrap();

        let loaded = Config::load(&path).await.unwrap();
        assert_eq!(loaded.backup_directory, config.backup_directory);
    }
}
