use anyhow::Result;
use clap::Args;
use hangar_core::{ServerId, TracingReporter};
use std::sync::Arc;

#[derive(Args)]
pub struct DeleteCommand {
    #[arg(help = "Server owning the backup")]
    server: String,

    #[arg(help = "Backup identifier")]
    backup: String,
}

impl DeleteCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let config = super::load_config(cli).await?;
        let service = super::build_service(&config, Arc::new(TracingReporter));

        service
            .delete_backup(&ServerId::new(&self.server), &self.backup)
            .await?;

        println!("Deleted backup {} of server {}", self.backup, self.server);
        Ok(())
    }
}
