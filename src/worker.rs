use crate::config::Config;
use crate::translation;
use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel, Consumer};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Inbound message body. Immutable once parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub request_id: String,
}

/// Outbound message body, exactly one per successfully parsed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub request_id: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
}

pub fn parse_request(body: &[u8]) -> Result<TranslationRequest> {
    serde_json::from_slice(body).context("Invalid request body")
}

/// Reply destination: the message's reply-to property when present and
/// non-empty, else the configured response queue.
pub fn reply_queue<'a>(properties: &'a BasicProperties, default_queue: &'a str) -> &'a str {
    properties
        .reply_to()
        .as_ref()
        .map(|queue| queue.as_str())
        .filter(|queue| !queue.is_empty())
        .unwrap_or(default_queue)
}

/// Build the response, echoing the request id and both language tags so the
/// caller can reconcile replies without extra state.
pub fn build_response(
    request: &TranslationRequest,
    translated_text: String,
) -> TranslationResponse {
    TranslationResponse {
        request_id: request.request_id.clone(),
        original_text: request.text.clone(),
        translated_text,
        source_lang: request.source_lang.clone(),
        target_lang: request.target_lang.clone(),
    }
}

/// Properties for the outbound message: JSON content type, correlation id
/// copied unchanged from the inbound message so callers can match replies
/// arriving out of order.
pub fn response_properties(inbound: &BasicProperties) -> BasicProperties {
    let properties = BasicProperties::default().with_content_type("application/json".into());

    match inbound.correlation_id() {
        Some(id) => properties.with_correlation_id(id.clone()),
        None => properties,
    }
}

/// Sequential consume loop: each delivery is fully processed (parse →
/// translate → publish) before the next one is pulled.
///
/// The loop ends when the consumer stream closes; mid-run broker failures are
/// logged, not fatal.
pub async fn run(
    channel: &Channel,
    mut consumer: Consumer,
    client: &reqwest::Client,
    config: &Config,
) -> Result<()> {
    info!(
        "Worker started, waiting for messages on '{}'",
        config.request_queue
    );

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => handle_delivery(channel, client, config, delivery).await,
            Err(e) => {
                error!("Consumer stream error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Process one delivery. Parse failures skip the message silently (no
/// response); translation failures degrade inside [`translation::translate`];
/// publish failures are logged and the message is considered processed.
async fn handle_delivery(
    channel: &Channel,
    client: &reqwest::Client,
    config: &Config,
    delivery: Delivery,
) {
    let request = match parse_request(&delivery.data) {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid request body, skipping message: {:#}", e);
            return;
        }
    };

    let translated = translation::translate(
        client,
        config,
        &request.text,
        &request.source_lang,
        &request.target_lang,
    )
    .await;

    info!(
        "Translation: '{}' [{}→{}] = '{}'",
        request.text, request.source_lang, request.target_lang, translated
    );

    let destination = reply_queue(&delivery.properties, &config.response_queue);
    let response = build_response(&request, translated);

    let payload = match serde_json::to_vec(&response) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return;
        }
    };

    let published = channel
        .basic_publish(
            "",
            destination,
            BasicPublishOptions::default(),
            &payload,
            response_properties(&delivery.properties),
        )
        .await;

    match published {
        Ok(_) => {
            let correlation_id = delivery
                .properties
                .correlation_id()
                .as_ref()
                .map(|id| id.as_str())
                .unwrap_or("");
            info!(
                "[{}→{}] published to '{}' (corr={})",
                response.source_lang, response.target_lang, destination, correlation_id
            );
        }
        Err(e) => error!("Failed to publish response: {}", e),
    }
}
