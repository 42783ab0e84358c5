//! apim-backup - Azure API Management backup tool
//!
//! Runs one backup of an API Management instance into Blob Storage and
//! prunes expired backups. Exits non-zero if any step fails.

use apim_backup::cli::{Cli, LogFormat};
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.debug, cli.log_format);

    if let Err(e) = cli.execute().await {
        error!(category = e.category(), "Backup run failed: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool, format: LogFormat) {
    let default_filter = if debug {
        "apim_backup=debug"
    } else {
        "apim_backup=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
