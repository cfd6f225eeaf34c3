use clap::Parser;
use tracing_subscriber::EnvFilter;

use adike_mitra::config::{Cli, Config};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = adike_mitra::run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
