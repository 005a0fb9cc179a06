use crate::adapter::{BackupContext, BackupDetails, BackupTarget};
use async_trait::async_trait;
use chrono::Utc;
use hangar_core::{AdapterKind, BackupId, BackupMetadata, Error, Result};
use sha2::{Digest, Sha256};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

pub const CHECKSUM_TYPE: &str = "sha256";

fn archive_path(dir: &Path, id: &BackupId) -> PathBuf {
    dir.join(format!("{}.tar.gz", id))
}

fn manifest_path(dir: &Path, id: &BackupId) -> PathBuf {
    dir.join(format!("{}.json", id))
}

/// Stores archives in a directory on the host.
#[derive(Debug, Clone)]
pub struct LocalBackup {
    details: BackupDetails,
    backup_dir: PathBuf,
}

impl LocalBackup {
    pub fn new<P: AsRef<Path>>(details: BackupDetails, backup_dir: P) -> Result<Self> {
        let backup_dir = backup_dir.as_ref();
        if backup_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfiguration(
                "local backup directory is not configured".to_string(),
            ));
        }
        Ok(Self {
            details,
            backup_dir: backup_dir.to_path_buf(),
        })
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn path(&self) -> PathBuf {
        archive_path(&self.backup_dir, &self.details.id)
    }

    async fn store(&self, ctx: &BackupContext) -> Result<BackupMetadata> {
        let dest = self.path();
        if fs::try_exists(&dest).await.map_err(Error::from_io)? {
            return Err(already_exists(&self.details.id));
        }

        // unique per run, deleted on drop unless persisted
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}.", self.details.id))
            .suffix(".tar.gz.part")
            .tempfile_in(&self.backup_dir)
            .map_err(Error::from_io)?
            .into_temp_path();

        let (size, checksum) = copy_with_checksum(&ctx.archive, &staging).await?;
        staging.persist_noclobber(&dest).map_err(|e| {
            if e.error.kind() == IoErrorKind::AlreadyExists {
                already_exists(&self.details.id)
            } else {
                Error::from_io(e.error)
            }
        })?;

        let metadata = BackupMetadata {
            id: self.details.id.clone(),
            server: ctx.server.clone(),
            adapter: AdapterKind::Local,
            location: dest.display().to_string(),
            size,
            checksum,
            checksum_type: CHECKSUM_TYPE.to_string(),
            created_at: Utc::now(),
        };

        if let Err(err) = self.write_manifest(&metadata).await {
            let _ = fs::remove_file(&dest).await;
            return Err(err);
        }

        Ok(metadata)
    }

    async fn write_manifest(&self, metadata: &BackupMetadata) -> Result<()> {
        let manifest = serde_json::to_vec_pretty(metadata)?;
        fs::write(manifest_path(&self.backup_dir, &metadata.id), manifest)
            .await
            .map_err(Error::from_io)
    }
}

pub(crate) fn already_exists(id: &BackupId) -> Error {
    Error::InvalidConfiguration(format!("backup {} already exists", id))
}

#[async_trait]
impl BackupTarget for LocalBackup {
    async fn run(&self, ctx: &BackupContext) -> Result<BackupMetadata> {
        fs::create_dir_all(&self.backup_dir).await.map_err(Error::from_io)?;

        let metadata = self.store(ctx).await?;
        debug!(backup = %metadata.id, location = %metadata.location, "Stored local backup");
        Ok(metadata)
    }

    fn details(&self) -> &BackupDetails {
        &self.details
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Local
    }
}

async fn copy_with_checksum(src: &Path, dest: &Path) -> Result<(u64, String)> {
    let mut reader = fs::File::open(src)
        .await
        .map_err(|e| Error::Backend(format!("Failed to open archive {}: {}", src.display(), e)))?;
    let mut writer = fs::File::create(dest).await.map_err(Error::from_io)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut size = 0u64;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        writer.write_all(&buffer[..read]).await.map_err(Error::from_io)?;
        size += read as u64;
    }

    writer.flush().await.map_err(Error::from_io)?;
    writer.sync_all().await.map_err(Error::from_io)?;

    Ok((size, hex::encode(hasher.finalize())))
}

/// Finds backups previously written by [`LocalBackup`].
#[derive(Debug, Clone)]
pub struct LocalBackupStore {
    dir: PathBuf,
}

impl LocalBackupStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn locate(&self, id: &str) -> Result<(LocalArtifact, BackupMetadata)> {
        let not_found = || Error::BackupNotFound { id: id.to_string() };
        let backup_id = BackupId::parse(id).ok_or_else(not_found)?;

        let archive = archive_path(&self.dir, &backup_id);
        let stat = match fs::metadata(&archive).await {
            Ok(stat) => stat,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(Error::Io(e)),
        };

        let corrupted = |reason: String| Error::Corrupted {
            id: id.to_string(),
            reason,
        };

        if !stat.is_file() {
            return Err(corrupted("archive is not a regular file".to_string()));
        }

        let manifest = manifest_path(&self.dir, &backup_id);
        let raw = match fs::read(&manifest).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(corrupted("manifest is missing".to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let metadata: BackupMetadata = serde_json::from_slice(&raw)
            .map_err(|e| corrupted(format!("manifest is unreadable: {}", e)))?;

        if metadata.id != backup_id {
            return Err(corrupted(format!("manifest describes backup {}", metadata.id)));
        }
        if metadata.size != stat.len() {
            return Err(corrupted(format!(
                "archive is {} bytes but manifest records {}",
                stat.len(),
                metadata.size
            )));
        }

        Ok((
            LocalArtifact {
                id: backup_id,
                archive,
                manifest,
            },
            metadata,
        ))
    }
}

/// A located local backup. Consumed by [`LocalArtifact::remove`].
#[derive(Debug)]
pub struct LocalArtifact {
    id: BackupId,
    archive: PathBuf,
    manifest: PathBuf,
}

impl LocalArtifact {
    pub fn id(&self) -> &BackupId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.archive
    }

    pub async fn remove(self) -> Result<()> {
        match fs::remove_file(&self.archive).await {
            Ok(()) => {}
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(Error::BackupNotFound {
                    id: self.id.to_string(),
                });
            }
            Err(e) => return Err(Error::Io(e)),
        }

        match fs::remove_file(&self.manifest).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
