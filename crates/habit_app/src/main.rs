use clap::Parser;

use habit_app::app::{run, AppConfig};
use habit_app::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("habit_app=info,habit_core=info,habit_sync=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .unwrap_or_default()
        .with_overrides(cli.data_dir, cli.cloud_dir);
    run(config, cli.command).await
}
