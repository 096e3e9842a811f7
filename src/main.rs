//! `buildvault` command line entry point

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    buildvault::cli::run_cli().await
}
