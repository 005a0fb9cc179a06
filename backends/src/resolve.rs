use crate::adapter::{BackupAdapter, BackupDetails};
use crate::local::{LocalBackup, already_exists};
use crate::s3::{S3Backup, S3Config};
use hangar_core::{AdapterKind, BackupId, BackupRequest, Config, Error, Result, S3Defaults};
use ignore::gitignore::GitignoreBuilder;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Turns raw backup requests into constructed adapters.
#[derive(Debug, Clone)]
pub struct AdapterResolver {
    backup_dir: PathBuf,
    s3: S3Defaults,
}

impl AdapterResolver {
    pub fn new<P: AsRef<Path>>(backup_dir: P, s3: S3Defaults) -> Self {
        Self {
            backup_dir: backup_dir.as_ref().to_path_buf(),
            s3,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.backup_directory, config.s3.clone())
    }

    /// The adapter tag is checked before anything else, so an unknown tag
    /// never leads to a constructed adapter.
    pub async fn resolve(&self, request: &BackupRequest) -> Result<BackupAdapter> {
        let kind: AdapterKind = request.adapter.parse()?;
        let details = backup_details(request)?;

        debug!(adapter = %kind, backup = %details.id, "Resolving backup adapter");

        match kind {
            AdapterKind::Local => {
                let id = details.id.clone();
                let backup = LocalBackup::new(details, &self.backup_dir)?;
                if fs::try_exists(backup.path()).await.map_err(Error::from_io)? {
                    return Err(already_exists(&id));
                }
                Ok(BackupAdapter::Local(backup))
            }
            AdapterKind::S3 => {
                let config = S3Config::from_request(request, &self.s3)?;
                Ok(BackupAdapter::S3(S3Backup::new(details, config).await?))
            }
        }
    }
}

fn backup_details(request: &BackupRequest) -> Result<BackupDetails> {
    let id = match request.uuid.as_deref() {
        Some(raw) => BackupId::parse(raw).ok_or_else(|| {
            Error::InvalidConfiguration(format!("invalid backup uuid {:?}", raw))
        })?,
        None => BackupId::generate(),
    };

    validate_ignore(&request.ignore)?;

    Ok(BackupDetails {
        id,
        ignore: request.ignore.clone(),
    })
}

/// Parses every pattern once so a bad pattern fails the request rather than
/// the background run.
fn validate_ignore(ignore: &str) -> Result<()> {
    let mut builder = GitignoreBuilder::new("/");
    for line in ignore.lines() {
        builder.add_line(None, line).map_err(|e| {
            Error::InvalidConfiguration(format!("invalid ignore pattern {:?}: {}", line, e))
        })?;
    }
    builder
        .build()
        .map(|_| ())
        .map_err(|e| Error::InvalidConfiguration(format!("invalid ignore patterns: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangar_core::ErrorKind;

    fn resolver() -> AdapterResolver {
        AdapterResolver::new("/var/lib/hangar/backups", S3Defaults::default())
    }

    #[tokio::test]
    async fn test_every_known_tag_resolves_to_its_variant() {
        let resolver = resolver();
        for kind in AdapterKind::ALL {
            let mut request = BackupRequest::new(kind.as_str());
            if kind == AdapterKind::S3 {
                request = request.with_bucket("hangar-backups");
            }
            let adapter = resolver.resolve(&request).await.unwrap();
            assert_eq!(adapter.kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_local_request_keeps_uuid_and_ignore() {
        let request = BackupRequest::new("local")
            .with_uuid("b42")
            .with_ignore("*.log\ncache/\n");
        match resolver().resolve(&request).await.unwrap() {
            BackupAdapter::Local(backup) => {
                assert_eq!(backup.path(), PathBuf::from("/var/lib/hangar/backups/b42.tar.gz"));
            }
            other => panic!("expected local adapter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_uuid_is_generated() {
        let adapter = resolver().resolve(&BackupRequest::new("local")).await.unwrap();
        assert!(BackupId::parse(adapter.id().as_str()).is_some());
    }

    #[tokio::test]
    async fn test_unknown_tag_is_rejected_before_validation() {
        // the uuid is invalid too, but the tag must be what gets reported
        let request = BackupRequest::new("ftp").with_uuid("../nope");
        let err = resolver().resolve(&request).await.unwrap_err();
        assert!(matches!(err, Error::UnknownAdapter { ref adapter } if adapter == "ftp"));
    }

    #[tokio::test]
    async fn test_empty_bucket_is_invalid_configuration() {
        let request = BackupRequest::new("s3").with_bucket("");
        let err = resolver().resolve(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_bad_uuid_is_invalid_configuration() {
        let request = BackupRequest::new("local").with_uuid("a/b");
        let err = resolver().resolve(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_bad_ignore_pattern_is_invalid_configuration() {
        let request = BackupRequest::new("local").with_ignore("logs/[z-a]");
        let err = resolver().resolve(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_uuid_of_stored_backup_is_invalid_configuration() {
        let backups = tempfile::tempdir().unwrap();
        fs::write(backups.path().join("taken.tar.gz"), b"existing").await.unwrap();
        let resolver = AdapterResolver::new(backups.path(), S3Defaults::default());

        let err = resolver
            .resolve(&BackupRequest::new("local").with_uuid("taken"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);

        let adapter = resolver
            .resolve(&BackupRequest::new("local").with_uuid("free"))
            .await
            .unwrap();
        assert_eq!(adapter.id().as_str(), "free");
    }

    #[tokio::test]
    async fn test_unconfigured_backup_dir_is_invalid_configuration() {
        let resolver = AdapterResolver::new("", S3Defaults::default());
        let err = resolver.resolve(&BackupRequest::new("local")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }
}
