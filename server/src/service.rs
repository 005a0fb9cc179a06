use crate::executor::{Acknowledgment, BackupExecutor};
use crate::registry::{Server, ServerRegistry};
use hangar_backends::{AdapterResolver, LocalBackupStore};
use hangar_core::{
    BackupRequest, Config, Error, ErrorReporter, ServerId, TrackExt, TrackedError,
};
use std::sync::Arc;
use tracing::info;

/// Entry points consumed by a transport: create and delete backups for a
/// single server.
pub struct BackupService {
    registry: Arc<dyn ServerRegistry>,
    resolver: AdapterResolver,
    store: LocalBackupStore,
    reporter: Arc<dyn ErrorReporter>,
    executor: BackupExecutor,
}

impl BackupService {
    pub fn new(
        registry: Arc<dyn ServerRegistry>,
        resolver: AdapterResolver,
        store: LocalBackupStore,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            registry,
            resolver,
            store,
            executor: BackupExecutor::new(Arc::clone(&reporter)),
            reporter,
        }
    }

    pub fn from_config(
        config: &Config,
        registry: Arc<dyn ServerRegistry>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self::new(
            registry,
            AdapterResolver::from_config(config),
            LocalBackupStore::new(&config.backup_directory),
            reporter,
        )
    }

    pub fn executor(&self) -> &BackupExecutor {
        &self.executor
    }

    /// Validates the request and starts the backup in the background. An
    /// `Ok` only means the backup was accepted.
    pub async fn create_backup(
        &self,
        server_id: &ServerId,
        request: &BackupRequest,
    ) -> Result<Acknowledgment, TrackedError> {
        let server = self.lookup(server_id)?;
        let adapter = self
            .resolver
            .resolve(request)
            .await
            .track(server_id)
            .map_err(|err| self.surface(err))?;

        Ok(self.executor.dispatch(adapter, server))
    }

    /// Removes a local backup. Completes before returning.
    pub async fn delete_backup(&self, server_id: &ServerId, backup_id: &str) -> Result<(), TrackedError> {
        self.lookup(server_id)?;

        let (artifact, metadata) = self
            .store
            .locate(backup_id)
            .await
            .track(server_id)
            .map_err(|err| self.surface(err))?;

        // another server's backup is indistinguishable from a missing one
        if &metadata.server != server_id {
            return Err(TrackedError::new(
                server_id.clone(),
                Error::BackupNotFound { id: backup_id.to_string() },
            ));
        }

        artifact
            .remove()
            .await
            .track(server_id)
            .map_err(|err| self.surface(err))?;

        info!(server = %server_id, backup = %metadata.id, "Deleted backup");
        Ok(())
    }

    fn lookup(&self, server_id: &ServerId) -> Result<Arc<dyn Server>, TrackedError> {
        self.registry.get_server(server_id).ok_or_else(|| {
            TrackedError::new(
                server_id.clone(),
                Error::ServerNotFound { id: server_id.to_string() },
            )
        })
    }

    /// Host-side failures also go to the operator log.
    fn surface(&self, err: TrackedError) -> TrackedError {
        if !err.kind().is_client_error() {
            self.reporter.report(&err);
        }
        err
    }
}
