//! beacon-pos CLI entry point.

mod cli;

use beacon_pos::proximity::feed;
use beacon_pos::{Advertisement, PosBuilder};
use clap::Parser;
use cli::Cli;
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("beacon-pos v{}", env!("CARGO_PKG_VERSION"));

    let advertisements = cli.advertisements.clone();

    // Build configuration
    let config = cli.into_config()?;

    let mut builder = PosBuilder::new(config);
    if let Some(source) = advertisements {
        let (tx, rx) = feed::channel();
        spawn_feed(source, tx);
        builder = builder.advertisements(rx);
    }

    // Build and run the terminal
    let mut pos = builder.build().await?;

    // Run until shutdown
    pos.run().await?;

    info!("Goodbye!");
    Ok(())
}

/// Pump advertisements from a file or stdin into the proximity loop.
fn spawn_feed(source: PathBuf, tx: mpsc::Sender<Advertisement>) {
    tokio::spawn(async move {
        let forwarded = if source == Path::new("-") {
            feed::forward(BufReader::new(tokio::io::stdin()), tx).await
        } else {
            match tokio::fs::File::open(&source).await {
                Ok(file) => feed::forward(BufReader::new(file), tx).await,
                Err(e) => Err(e.into()),
            }
        };

        match forwarded {
            Ok(count) => info!("Advertisement feed {} ended after {} entries", source.display(), count),
            Err(e) => error!("Advertisement feed {} failed: {}", source.display(), e),
        }
    });
}
