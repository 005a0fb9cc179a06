pub mod create;
pub mod delete;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use hangar_core::{Config, ErrorReporter, ServerId};
use hangar_server::{BackupService, DirectoryServer, InMemoryRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

fn config_path(cli: &crate::Cli) -> Option<PathBuf> {
    cli.config.clone().or_else(|| {
        ProjectDirs::from("", "", "hangar").map(|dirs| dirs.config_dir().join("config.toml"))
    })
}

pub async fn load_config(cli: &crate::Cli) -> Result<Config> {
    match config_path(cli) {
        Some(path) if path.exists() => {
            info!("Loading configuration from: {}", path.display());
            Config::load(&path)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))
        }
        Some(path) if cli.config.is_some() => {
            anyhow::bail!("Configuration file not found: {}", path.display())
        }
        _ => {
            debug!("No configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

pub fn build_service(config: &Config, reporter: Arc<dyn ErrorReporter>) -> BackupService {
    let registry = InMemoryRegistry::new();
    for entry in &config.servers {
        registry.insert(Arc::new(DirectoryServer::new(ServerId::new(&entry.id), &entry.root)));
    }
    debug!(servers = registry.len(), "Registered servers");

    BackupService::from_config(config, Arc::new(registry), reporter)
}
