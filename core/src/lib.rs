pub mod config;
pub mod error;
pub mod report;
pub mod request;
pub mod tracked;
pub mod types;

pub use config::{Config, S3Defaults, ServerEntry};
pub use error::{Error, ErrorKind, Result};
pub use report::{ErrorReporter, TracingReporter};
pub use request::BackupRequest;
pub use tracked::{TrackExt, TrackedError};
pub use types::*;
