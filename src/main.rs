mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!(
        "Starting terraform-provider-buildkite {}",
        buildkite_provider::VERSION
    );
    cli.execute().await?;

    Ok(())
}
