use anyhow::Result;
use tracing::info;

use translate_worker::{broker, config, worker};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translate_worker=info".parse()?),
        )
        .init();

    info!("Starting translation worker");

    // Load configuration from environment
    let config = config::Config::from_env()?;

    // Connect to the broker (fatal if retries are exhausted)
    let broker = broker::Broker::connect(&config).await?;
    let consumer = broker.consume(&config).await?;

    let client = reqwest::Client::new();

    // Consume until the broker feed ends
    worker::run(broker.channel(), consumer, &client, &config).await?;

    broker.close().await?;
    info!("Worker stopped");
    Ok(())
}
