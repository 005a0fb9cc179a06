use crate::{Error, ErrorKind, ServerId};
use thiserror::Error;

/// An error bound to the server it concerns.
#[derive(Error, Debug)]
#[error("[{server}] {source}")]
pub struct TrackedError {
    server: ServerId,
    #[source]
    source: Error,
}

impl TrackedError {
    pub fn new(server: ServerId, source: Error) -> Self {
        Self { server, source }
    }

    pub fn server(&self) -> &ServerId {
        &self.server
    }

    pub fn inner(&self) -> &Error {
        &self.source
    }

    pub fn into_inner(self) -> Error {
        self.source
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

pub trait TrackExt<T> {
    fn track(self, server: &ServerId) -> std::result::Result<T, TrackedError>;
}

impl<T> TrackExt<T> for crate::Result<T> {
    fn track(self, server: &ServerId) -> std::result::Result<T, TrackedError> {
        self.map_err(|err| TrackedError::new(server.clone(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_server() {
        let err = TrackedError::new(
            ServerId::new("S1"),
            Error::BackupNotFound { id: "b123".to_string() },
        );
        assert_eq!(err.to_string(), "[S1] Backup not found: b123");
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_track_binds_server() {
        let result: crate::Result<()> = Err(Error::Other("boom".to_string()));
        let err = result.track(&ServerId::new("S2")).unwrap_err();
        assert_eq!(err.server().as_str(), "S2");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
