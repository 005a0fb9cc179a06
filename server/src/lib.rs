pub mod archive;
pub mod executor;
pub mod registry;
pub mod service;

#[cfg(test)]
mod testing;

pub use archive::DirectoryServer;
pub use executor::{Acknowledgment, BackupExecutor};
pub use registry::{InMemoryRegistry, Server, ServerRegistry};
pub use service::BackupService;
