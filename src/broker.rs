use crate::config::Config;
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use lapin::options::{BasicConsumeOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tracing::info;

/// Owned broker connection plus the single operating channel.
///
/// Acquired once at startup and released through [`Broker::close`] when the
/// consume loop ends; the worker is single-threaded so no pooling is needed.
pub struct Broker {
    connection: Connection,
    channel: Channel,
}

impl Broker {
    /// Connect to RabbitMQ with bounded exponential backoff, open a channel,
    /// and declare the durable request queue.
    ///
    /// Exhausting the retry budget is a fatal startup condition: the error
    /// propagates to the caller and the process must not run without a broker.
    pub async fn connect(config: &Config) -> Result<Self> {
        let connection = with_retry(&RetryConfig::broker_connect(), "RabbitMQ connect", || {
            Connection::connect(&config.amqp_url, ConnectionProperties::default())
        })
        .await
        .context("Failed to connect to RabbitMQ after retries")?;

        let channel = connection
            .create_channel()
            .await
            .context("Failed to open channel")?;

        // Idempotent: safe if the queue already exists with these arguments
        channel
            .queue_declare(
                &config.request_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to declare queue '{}'", config.request_queue))?;

        info!(
            "Connected to RabbitMQ, declared queue '{}'",
            config.request_queue
        );

        Ok(Self {
            connection,
            channel,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Subscribe to the request queue.
    ///
    /// Deliveries are auto-acknowledged (`no_ack`): a crash between receipt
    /// and publish loses the message with no redelivery. That is the accepted
    /// semantics for this worker.
    pub async fn consume(&self, config: &Config) -> Result<Consumer> {
        self.channel
            .basic_consume(
                &config.request_queue,
                "translate-worker",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .context("Failed to register consumer")
    }

    /// Release the connection (and with it the channel).
    pub async fn close(self) -> Result<()> {
        self.connection
            .close(200, "worker shutting down")
            .await
            .context("Failed to close RabbitMQ connection")
    }
}
