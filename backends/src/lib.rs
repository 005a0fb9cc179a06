pub mod adapter;
pub mod local;
pub mod resolve;
pub mod retry;
pub mod s3;

pub use adapter::{BackupAdapter, BackupContext, BackupDetails, BackupTarget};
pub use local::{LocalArtifact, LocalBackup, LocalBackupStore};
pub use resolve::AdapterResolver;
pub use retry::{RetryConfig, Retryable, retry_with_backoff};
pub use s3::{S3Backup, S3Config};
