use crate::registry::Server;
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use hangar_backends::{BackupAdapter, BackupContext};
use hangar_core::{BackupMetadata, Error, Result, ServerId};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A server whose state is a directory tree on this host.
#[derive(Debug, Clone)]
pub struct DirectoryServer {
    id: ServerId,
    root: PathBuf,
}

impl DirectoryServer {
    pub fn new<P: AsRef<Path>>(id: ServerId, root: P) -> Self {
        Self {
            id,
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Server for DirectoryServer {
    fn id(&self) -> &ServerId {
        &self.id
    }

    async fn run_backup(&self, adapter: BackupAdapter) -> Result<BackupMetadata> {
        if !self.root.is_dir() {
            return Err(Error::Backend(format!(
                "server root {} is not a directory",
                self.root.display()
            )));
        }

        let matcher = ignore_matcher(&self.root, adapter.ignore())?;
        let staging = tempfile::Builder::new()
            .prefix("hangar-")
            .suffix(".tar.gz")
            .tempfile()?;
        let file = staging.reopen()?;
        let root = self.root.clone();

        info!(server = %self.id, backup = %adapter.id(), "Archiving server files");
        let entries = tokio::task::spawn_blocking(move || write_archive(&root, &matcher, file))
            .await
            .map_err(|e| Error::Other(format!("archive task failed: {}", e)))??;
        debug!(server = %self.id, backup = %adapter.id(), entries, "Archive written");

        let ctx = BackupContext {
            server: self.id.clone(),
            archive: staging.path().to_path_buf(),
        };
        adapter.run(&ctx).await
    }
}

fn ignore_matcher(root: &Path, patterns: &str) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    for line in patterns.lines() {
        builder
            .add_line(None, line)
            .map_err(|e| Error::InvalidConfiguration(format!("invalid ignore pattern {:?}: {}", line, e)))?;
    }
    builder
        .build()
        .map_err(|e| Error::InvalidConfiguration(format!("invalid ignore patterns: {}", e)))
}

/// Writes `root` as a gzipped tar into `file`, returning the entry count.
fn write_archive(root: &Path, matcher: &Gitignore, file: File) -> Result<u64> {
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    let mut entries = 0u64;
    let mut walker = WalkDir::new(root).follow_links(false).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Other(format!("walked outside server root: {}", e)))?;
        let is_dir = entry.file_type().is_dir();

        if matcher.matched_path_or_any_parents(relative, is_dir).is_ignore() {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        builder.append_path_with_name(entry.path(), relative)?;
        entries += 1;
    }

    let encoder = builder.into_inner()?;
    let file = encoder.finish()?;
    file.sync_all()?;
    Ok(entries)
}
