//! voxsum CLI entry point.

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = voxsum::cli::Cli::parse();
    voxsum::cli::run(cli).await
}
