use anyhow::{anyhow, Result};
use clap::Args;
use hangar_core::{BackupRequest, ErrorReporter, ServerId, TracingReporter, TrackedError};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

#[derive(Args)]
pub struct CreateCommand {
    #[arg(help = "Server to back up")]
    server: String,

    #[arg(long, default_value = "local", help = "Backup adapter (local, s3)")]
    adapter: String,

    #[arg(long, help = "Backup identifier (generated when omitted)")]
    uuid: Option<String>,

    #[arg(long, help = "Ignore pattern, gitignore syntax (repeatable)")]
    ignore: Vec<String>,

    #[arg(long, help = "S3 bucket name")]
    bucket: Option<String>,

    #[arg(long, help = "S3 region")]
    region: Option<String>,

    #[arg(long, help = "S3 key prefix")]
    prefix: Option<String>,

    #[arg(long, help = "S3 endpoint URL")]
    endpoint: Option<String>,

    #[arg(long, help = "S3 multipart part size in bytes")]
    part_size: Option<u64>,

    #[arg(long, help = "Print the acknowledgment as JSON")]
    json: bool,
}

/// Logs like the daemon would, but remembers whether anything failed so the
/// process can exit non-zero.
#[derive(Default)]
struct CountingReporter {
    failures: AtomicUsize,
}

impl ErrorReporter for CountingReporter {
    fn report(&self, error: &TrackedError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        TracingReporter.report(error);
    }
}

impl CreateCommand {
    fn request(&self) -> BackupRequest {
        BackupRequest {
            adapter: self.adapter.clone(),
            uuid: self.uuid.clone(),
            ignore: self.ignore.join("\n"),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            prefix: self.prefix.clone(),
            endpoint: self.endpoint.clone(),
            part_size: self.part_size,
        }
    }

    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let config = super::load_config(cli).await?;
        let reporter = Arc::new(CountingReporter::default());
        let service = super::build_service(&config, reporter.clone());

        let server = ServerId::new(&self.server);
        let ack = service.create_backup(&server, &self.request()).await?;

        if self.json {
            println!(
                "{}",
                serde_json::json!({
                    "server": ack.server.as_str(),
                    "backup": ack.backup.as_str(),
                    "adapter": ack.adapter.as_str(),
                    "status": "accepted",
                })
            );
        } else {
            println!("Backup {} accepted for server {} ({})", ack.backup, ack.server, ack.adapter);
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("Backing up {}...", ack.server));

        service.executor().shutdown().await;
        pb.finish_and_clear();

        if reporter.failures.load(Ordering::SeqCst) > 0 {
            return Err(anyhow!("Backup {} for server {} failed, see log for details", ack.backup, ack.server));
        }

        info!(server = %ack.server, backup = %ack.backup, "Backup finished");
        println!("Backup {} finished", ack.backup);
        Ok(())
    }
}
