//! Fakes shared by the unit tests of this crate.

use crate::registry::Server;
use async_trait::async_trait;
use hangar_backends::{BackupAdapter, BackupDetails, LocalBackup};
use hangar_core::{
    BackupId, BackupMetadata, Error, ErrorKind, ErrorReporter, Result, ServerId, TrackedError,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

pub fn local_adapter(id: &str) -> BackupAdapter {
    let details = BackupDetails {
        id: BackupId::parse(id).unwrap(),
        ignore: String::new(),
    };
    BackupAdapter::Local(LocalBackup::new(details, "/tmp/hangar-test-backups").unwrap())
}

fn fake_metadata(server: &ServerId, adapter: &BackupAdapter) -> BackupMetadata {
    BackupMetadata {
        id: adapter.id().clone(),
        server: server.clone(),
        adapter: adapter.kind(),
        location: "memory".to_string(),
        size: 0,
        checksum: String::new(),
        checksum_type: "sha256".to_string(),
        created_at: chrono::Utc::now(),
    }
}

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub server: ServerId,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<ReportEntry>>,
}

impl RecordingReporter {
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, error: &TrackedError) {
        self.entries.lock().unwrap().push(ReportEntry {
            server: error.server().clone(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// Blocks inside `run_backup` until released.
pub struct GatedServer {
    id: ServerId,
    started: Notify,
    gate: Notify,
    finished: AtomicBool,
}

impl GatedServer {
    pub fn new(id: &str) -> Self {
        Self {
            id: ServerId::new(id),
            started: Notify::new(),
            gate: Notify::new(),
            finished: AtomicBool::new(false),
        }
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Server for GatedServer {
    fn id(&self) -> &ServerId {
        &self.id
    }

    async fn run_backup(&self, adapter: BackupAdapter) -> Result<BackupMetadata> {
        self.started.notify_one();
        self.gate.notified().await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(fake_metadata(&self.id, &adapter))
    }
}

#[derive(Debug, Clone, Copy)]
enum Script {
    Succeed,
    Fail,
    Panic,
}

/// Records every adapter it is handed and then behaves as scripted.
pub struct ScriptedServer {
    id: ServerId,
    script: Script,
    runs: Mutex<Vec<String>>,
}

impl ScriptedServer {
    fn new(id: &str, script: Script) -> Self {
        Self {
            id: ServerId::new(id),
            script,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(id: &str) -> Self {
        Self::new(id, Script::Succeed)
    }

    pub fn failing(id: &str) -> Self {
        Self::new(id, Script::Fail)
    }

    pub fn panicking(id: &str) -> Self {
        Self::new(id, Script::Panic)
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Server for ScriptedServer {
    fn id(&self) -> &ServerId {
        &self.id
    }

    async fn run_backup(&self, adapter: BackupAdapter) -> Result<BackupMetadata> {
        self.runs.lock().unwrap().push(adapter.id().to_string());
        match self.script {
            Script::Succeed => Ok(fake_metadata(&self.id, &adapter)),
            Script::Fail => Err(Error::Io(std::io::Error::other("disk unplugged"))),
            Script::Panic => panic!("archiver exploded"),
        }
    }
}
