use crate::registry::Server;
use futures::FutureExt;
use hangar_backends::BackupAdapter;
use hangar_core::{AdapterKind, BackupId, Error, ErrorReporter, ServerId, TrackedError};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Confirms a backup was handed to a background task. Says nothing about
/// whether it will succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    pub server: ServerId,
    pub backup: BackupId,
    pub adapter: AdapterKind,
}

/// Runs backups detached from the caller. Outcomes only ever reach the
/// reporter.
pub struct BackupExecutor {
    reporter: Arc<dyn ErrorReporter>,
    tracker: TaskTracker,
}

impl BackupExecutor {
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            reporter,
            tracker: TaskTracker::new(),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, adapter: BackupAdapter, server: Arc<dyn Server>) -> Acknowledgment {
        let ack = Acknowledgment {
            server: server.id().clone(),
            backup: adapter.id().clone(),
            adapter: adapter.kind(),
        };
        debug!(server = %ack.server, backup = %ack.backup, adapter = %ack.adapter, "Dispatching backup");

        let reporter = Arc::clone(&self.reporter);
        let server_id = ack.server.clone();
        let backup_id = ack.backup.clone();

        self.tracker.spawn(async move {
            let outcome = AssertUnwindSafe(server.run_backup(adapter))
                .catch_unwind()
                .await;

            let source = match outcome {
                Ok(Ok(metadata)) => {
                    info!(
                        server = %server_id,
                        backup = %metadata.id,
                        location = %metadata.location,
                        size = metadata.size,
                        checksum = %metadata.short_checksum(),
                        "Backup completed"
                    );
                    return;
                }
                Ok(Err(err)) => err,
                Err(panic) => {
                    Error::Other(format!("backup task panicked: {}", panic_message(&*panic)))
                }
            };

            let err = Error::BackupExecution {
                id: backup_id.to_string(),
                source: Box::new(source),
            };
            reporter.report(&TrackedError::new(server_id, err));
        });

        ack
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every dispatched backup to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{local_adapter, GatedServer, RecordingReporter, ScriptedServer};
    use hangar_core::ErrorKind;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dispatch_returns_before_backup_finishes() {
        let reporter = Arc::new(RecordingReporter::default());
        let executor = BackupExecutor::new(reporter.clone());
        let server = Arc::new(GatedServer::new("S1"));

        let ack = executor.dispatch(local_adapter("b1"), server.clone());
        assert_eq!(ack.server, ServerId::new("S1"));
        assert_eq!(ack.backup.as_str(), "b1");
        assert_eq!(ack.adapter, AdapterKind::Local);

        server.wait_started().await;
        assert!(!server.finished());
        assert_eq!(executor.in_flight(), 1);

        server.release();
        executor.shutdown().await;
        assert!(server.finished());
        assert!(reporter.entries().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_reported_once_with_server_identity() {
        let reporter = Arc::new(RecordingReporter::default());
        let executor = BackupExecutor::new(reporter.clone());
        let server = Arc::new(ScriptedServer::failing("S1"));

        executor.dispatch(local_adapter("b2"), server);
        executor.shutdown().await;

        let entries = reporter.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].server, ServerId::new("S1"));
        assert_eq!(entries[0].kind, ErrorKind::BackupExecutionFailure);
        assert!(entries[0].message.contains("b2"));
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_reported() {
        let reporter = Arc::new(RecordingReporter::default());
        let executor = BackupExecutor::new(reporter.clone());

        executor.dispatch(local_adapter("b3"), Arc::new(ScriptedServer::panicking("S1")));
        executor.shutdown().await;

        let entries = reporter.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("panicked"));

        // the runtime keeps serving new work
        let handle = tokio::spawn(async { 7 });
        assert_eq!(tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_concurrent_backups_for_one_server_all_run() {
        let reporter = Arc::new(RecordingReporter::default());
        let executor = BackupExecutor::new(reporter.clone());
        let server = Arc::new(ScriptedServer::succeeding("S1"));

        for id in ["c1", "c2", "c3"] {
            executor.dispatch(local_adapter(id), server.clone());
        }
        executor.shutdown().await;

        let mut ran = server.runs();
        ran.sort();
        assert_eq!(ran, vec!["c1", "c2", "c3"]);
        assert!(reporter.entries().is_empty());
    }
}
