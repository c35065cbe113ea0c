//! Tributary CLI binary.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tributary::cli::Cli;

/// Main entry point for the tributary CLI.
///
/// Analysis fans CPU work out to rayon, so the async side only needs a
/// current_thread runtime for provider I/O.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // RUST_LOG wins over -v. Logs go to stderr so JSON output stays clean.
    // Example: RUST_LOG=tributary=debug tributary build orders_raw
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Starting tributary CLI");
    cli.execute().await?;
    tracing::debug!("Tributary CLI completed successfully");
    Ok(())
}
