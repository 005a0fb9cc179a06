use serde::{Deserialize, Serialize};

/// Raw backup request as received from a caller. Nothing in here is trusted
/// until it has been resolved into an adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupRequest {
    pub adapter: String,

    #[serde(default)]
    pub uuid: Option<String>,

    /// Newline separated gitignore-style patterns excluded from the archive.
    #[serde(default)]
    pub ignore: String,

    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub part_size: Option<u64>,
}

impl BackupRequest {
    pub fn new(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            ..Default::default()
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_ignore(mut self, ignore: impl Into<String>) -> Self {
        self.ignore = ignore.into();
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }
}
