//! Handler for Slack interactive components.
//!
//! Button presses arrive as `block_actions`; each pressed button is queued
//! with its callback data for the worker's wizard.

use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::helpers::ok_empty;
use super::parsing::{v_array, v_str};
use super::sqs;
use crate::core::config::AppConfig;
use crate::core::models::QueuedEvent;

/// Turns a `block_actions` payload into queued actions, one per button.
#[must_use]
pub fn block_actions_to_queued(payload: &Value) -> Vec<QueuedEvent> {
    let Some(user_id) = v_str(payload, &["user", "id"]) else {
        return Vec::new();
    };
    let Some(channel_id) = v_str(payload, &["channel", "id"])
        .or_else(|| v_str(payload, &["container", "channel_id"]))
    else {
        return Vec::new();
    };
    let message_ts = v_str(payload, &["container", "message_ts"])
        .or_else(|| v_str(payload, &["message", "ts"]))
        .map(ToString::to_string);

    v_array(payload, &["actions"])
        .map(|actions| {
            actions
                .iter()
                .filter_map(|action| {
                    action
                        .get("action_id")
                        .and_then(Value::as_str)
                        .or_else(|| action.get("value").and_then(Value::as_str))
                })
                .map(|action_id| QueuedEvent::Action {
                    correlation_id: Uuid::new_v4().to_string(),
                    user_id: user_id.to_string(),
                    channel_id: channel_id.to_string(),
                    action_id: action_id.to_string(),
                    message_ts: message_ts.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Handle an interactive payload from Slack.
pub async fn handle_interactive(config: &AppConfig, payload: &Value) -> Value {
    let payload_type = v_str(payload, &["type"]).unwrap_or("");
    info!(payload_type = %payload_type, "Processing interactive payload");

    if payload_type != "block_actions" {
        debug!("Ignoring interactive payload type");
        return ok_empty();
    }

    for queued in block_actions_to_queued(payload) {
        if let Err(e) = sqs::send_to_sqs(&queued, config).await {
            error!(correlation_id = %queued.correlation_id(), "enqueue failed: {}", e);
        }
    }
    ok_empty()
}
