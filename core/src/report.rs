use crate::{ErrorKind, TrackedError};
use tracing::error;

/// Operator-facing sink for failures that cannot be returned to a caller.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &TrackedError);
}

/// Emits every report as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &TrackedError) {
        match err.kind() {
            ErrorKind::BackupExecutionFailure => error!(
                server = %err.server(),
                kind = %err.kind(),
                error = %err.inner(),
                "failed to generate backup for server"
            ),
            _ => error!(
                server = %err.server(),
                kind = %err.kind(),
                error = %err.inner(),
                "error while processing backup request"
            ),
        }
    }
}
