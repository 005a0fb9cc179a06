use async_trait::async_trait;
use hangar_backends::BackupAdapter;
use hangar_core::{BackupMetadata, Result, ServerId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A managed server that knows how to archive itself.
#[async_trait]
pub trait Server: Send + Sync {
    fn id(&self) -> &ServerId;

    /// Produces the server's archive and hands it to `adapter`.
    async fn run_backup(&self, adapter: BackupAdapter) -> Result<BackupMetadata>;
}

pub trait ServerRegistry: Send + Sync {
    fn get_server(&self, id: &ServerId) -> Option<Arc<dyn Server>>;
}

#[derive(Default)]
pub struct InMemoryRegistry {
    servers: RwLock<HashMap<ServerId, Arc<dyn Server>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, server: Arc<dyn Server>) -> Option<Arc<dyn Server>> {
        let mut servers = self.servers.write().unwrap_or_else(|e| e.into_inner());
        servers.insert(server.id().clone(), server)
    }

    pub fn remove(&self, id: &ServerId) -> Option<Arc<dyn Server>> {
        let mut servers = self.servers.write().unwrap_or_else(|e| e.into_inner());
        servers.remove(id)
    }

    pub fn len(&self) -> usize {
        self.servers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ServerRegistry for InMemoryRegistry {
    fn get_server(&self, id: &ServerId) -> Option<Arc<dyn Server>> {
        let servers = self.servers.read().unwrap_or_else(|e| e.into_inner());
        servers.get(id).cloned()
    }
}
