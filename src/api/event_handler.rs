//! Handler for Slack Events API callbacks.
//!
//! Only direct messages to the bot become work; everything else is acked and
//! dropped.

use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::helpers::{ok_empty, ok_text};
use super::sqs;
use crate::core::config::AppConfig;
use crate::core::models::QueuedEvent;

/// Normalises a `message` event into a queued message.
///
/// Bot messages, edits and other subtypes are ignored so the bot never
/// answers itself.
#[must_use]
pub fn message_event_to_queued(event: &Value, correlation_id: &str) -> Option<QueuedEvent> {
    if event.get("bot_id").is_some() || event.get("subtype").is_some() {
        return None;
    }
    let channel_type = event.get("channel_type").and_then(Value::as_str);
    if channel_type.is_some_and(|t| t != "im") {
        return None;
    }

    let user_id = event.get("user").and_then(Value::as_str)?;
    let channel_id = event.get("channel").and_then(Value::as_str)?;
    let text = event.get("text").and_then(Value::as_str).unwrap_or("");
    if user_id.is_empty() || channel_id.is_empty() || text.trim().is_empty() {
        return None;
    }

    Some(QueuedEvent::Message {
        correlation_id: correlation_id.to_string(),
        user_id: user_id.to_string(),
        channel_id: channel_id.to_string(),
        text: text.to_string(),
    })
}

/// Handle an `event_callback` or `url_verification` payload from Slack.
pub async fn handle_event_callback(config: &AppConfig, json_body: &Value) -> Value {
    let body_type = json_body.get("type").and_then(Value::as_str).unwrap_or("");

    if body_type == "url_verification" {
        let challenge = json_body
            .get("challenge")
            .and_then(Value::as_str)
            .unwrap_or("");
        return ok_text(challenge);
    }
    if body_type != "event_callback" {
        return ok_empty();
    }

    let Some(event) = json_body.get("event") else {
        return ok_empty();
    };
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");
    info!(event_type = %event_type, "Processing event callback");

    if !matches!(event_type, "message" | "message.im") {
        return ok_empty();
    }

    let correlation_id = Uuid::new_v4().to_string();
    let Some(queued) = message_event_to_queued(event, &correlation_id) else {
        debug!("Ignoring message event");
        return ok_empty();
    };

    if let Err(e) = sqs::send_to_sqs(&queued, config).await {
        error!(correlation_id = %correlation_id, "enqueue failed: {}", e);
    }
    ok_empty()
}
