use anyhow::Result;
use campaign_sql::config::Config;
use campaign_sql::task::{should_run, CampaignSqlTask};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse CLI arguments
    let config = Config::parse();

    info!("campaign-sql v{} starting...", env!("CARGO_PKG_VERSION"));

    let force = config.force;
    let task = CampaignSqlTask::new(config)?;

    let path = task.output_path();
    if !should_run(&path, force) {
        info!("Output {} already exists, task is complete", path.display());
        return Ok(());
    }

    let outcome = task.run().await?;
    info!(
        "Task complete: {} ({} bytes)",
        outcome.path.display(),
        outcome.bytes
    );

    Ok(())
}
