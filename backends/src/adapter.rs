use crate::local::LocalBackup;
use crate::s3::S3Backup;
use async_trait::async_trait;
use hangar_core::{AdapterKind, BackupId, BackupMetadata, Result, ServerId};
use std::path::PathBuf;

/// Input handed to an adapter by the server performing the backup.
#[derive(Debug, Clone)]
pub struct BackupContext {
    pub server: ServerId,
    /// Archive produced by the server, ready to be stored.
    pub archive: PathBuf,
}

/// Identity and exclusions shared by every adapter variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDetails {
    pub id: BackupId,
    pub ignore: String,
}

#[async_trait]
pub trait BackupTarget: Send + Sync {
    async fn run(&self, ctx: &BackupContext) -> Result<BackupMetadata>;

    fn details(&self) -> &BackupDetails;

    fn kind(&self) -> AdapterKind;
}

/// A fully constructed backup destination.
pub enum BackupAdapter {
    Local(LocalBackup),
    S3(S3Backup),
}

impl BackupAdapter {
    #[inline]
    fn target(&self) -> &dyn BackupTarget {
        match self {
            BackupAdapter::Local(backup) => backup,
            BackupAdapter::S3(backup) => backup,
        }
    }

    pub fn kind(&self) -> AdapterKind {
        self.target().kind()
    }

    pub fn id(&self) -> &BackupId {
        &self.target().details().id
    }

    pub fn ignore(&self) -> &str {
        &self.target().details().ignore
    }

    pub async fn run(&self, ctx: &BackupContext) -> Result<BackupMetadata> {
        self.target().run(ctx).await
    }
}

impl std::fmt::Debug for BackupAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupAdapter")
            .field("kind", &self.kind())
            .field("id", self.id())
            .finish()
    }
}
