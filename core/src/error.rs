use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown backup adapter [{adapter}] provided")]
    UnknownAdapter { adapter: String },

    #[error("Invalid backup configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Backup not found: {id}")]
    BackupNotFound { id: String },

    #[error("Server not found: {id}")]
    ServerNotFound { id: String },

    #[error("Backup {id} is corrupted: {reason}")]
    Corrupted { id: String, reason: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("failed to generate backup {id}: {source}")]
    BackupExecution {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used for operator logs and for mapping onto a
/// transport's response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownAdapter,
    InvalidConfiguration,
    NotFound,
    Io,
    Corrupted,
    Authentication,
    Capacity,
    BackupExecutionFailure,
    Internal,
}

impl ErrorKind {
    /// Errors caused by the request itself rather than by the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::UnknownAdapter | ErrorKind::InvalidConfiguration | ErrorKind::NotFound
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::UnknownAdapter | ErrorKind::InvalidConfiguration => 400,
            ErrorKind::NotFound => 404,
            _ => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownAdapter => "unknown_adapter",
            ErrorKind::InvalidConfiguration => "invalid_configuration",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
            ErrorKind::Corrupted => "corrupted",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Capacity => "capacity",
            ErrorKind::BackupExecutionFailure => "backup_execution_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::UnknownAdapter { .. } => ErrorKind::UnknownAdapter,
            Error::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Error::BackupNotFound { .. } | Error::ServerNotFound { .. } => ErrorKind::NotFound,
            Error::Corrupted { .. } => ErrorKind::Corrupted,
            Error::Authentication(_) => ErrorKind::Authentication,
            Error::QuotaExceeded(_) => ErrorKind::Capacity,
            Error::BackupExecution { .. } => ErrorKind::BackupExecutionFailure,
            Error::Serialization(_) | Error::Backend(_) | Error::Config(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Maps an I/O failure, keeping a full disk distinguishable from other
    /// I/O errors.
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::StorageFull => Error::QuotaExceeded(err.to_string()),
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_to_status_codes() {
        let unknown = Error::UnknownAdapter { adapter: "ftp".to_string() };
        assert_eq!(unknown.kind(), ErrorKind::UnknownAdapter);
        assert_eq!(unknown.kind().status_code(), 400);

        let missing = Error::BackupNotFound { id: "b123".to_string() };
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.kind().status_code(), 404);
        assert!(missing.kind().is_client_error());

        let io = Error::Io(std::io::Error::other("disk gone"));
        assert_eq!(io.kind().status_code(), 500);
        assert!(!io.kind().is_client_error());
    }

    #[test]
    fn test_unknown_adapter_message_names_tag() {
        let err = Error::UnknownAdapter { adapter: "ftp".to_string() };
        assert_eq!(err.to_string(), "unknown backup adapter [ftp] provided");
    }

    #[test]
    fn test_execution_failure_keeps_source() {
        let err = Error::BackupExecution {
            id: "abc".to_string(),
            source: Box::new(Error::Authentication("bad key".to_string())),
        };
        assert_eq!(err.kind(), ErrorKind::BackupExecutionFailure);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn test_full_disk_is_capacity() {
        let err = Error::from_io(std::io::Error::from(std::io::ErrorKind::StorageFull));
        assert_eq!(err.kind(), ErrorKind::Capacity);

        let err = Error::from_io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
