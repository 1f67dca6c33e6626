//! API Lambda handler - thin router that delegates to specialized handlers.
//!
//! This module handles:
//! - Request validation (headers, body, signature)
//! - Work-management webhooks (delegated to `webhook` module)
//! - Event callbacks (delegated to `event_handler` module)
//! - Interactive components (delegated to `interactive_handler` module)
//! - Slash commands (delegated to `slash_handler` module)

use super::{
    event_handler, helpers, interactive_handler, parsing, signature, slash_handler, webhook,
};
use crate::core::config::AppConfig;
use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

pub use self::function_handler as handler;

/// Path suffix of the work-management webhook route.
pub const WEBHOOK_PATH: &str = "/webhooks/work-items";

/// Lambda handler for the API entrypoint.
///
/// Routes requests to specialized handlers based on path and payload type.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded; request problems are
/// reported as error response payloads instead.
#[tracing::instrument(level = "info", skip(event))]
pub async fn function_handler(
    event: LambdaEvent<serde_json::Value>,
) -> Result<impl Serialize, Error> {
    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        Error::from(e)
    })?;
    Ok(route(&config, &event.payload).await)
}

/// Routes one API Gateway request and returns the response payload.
pub async fn route(config: &AppConfig, payload: &Value) -> Value {
    let Some(headers) = payload.get("headers") else {
        error!("Request missing headers");
        return helpers::err_response(400, "Missing headers");
    };

    let body = match extract_body(payload) {
        Ok(b) => b,
        Err(response) => return response,
    };

    // ========================================================================
    // Webhooks (not signed by Slack)
    // ========================================================================

    let path = payload
        .get("rawPath")
        .and_then(|v| v.as_str())
        .or_else(|| payload.get("path").and_then(|v| v.as_str()));

    if let Some(path) = path {
        info!(raw_path = %path, "Request path");
        if path.trim_end_matches('/').ends_with(WEBHOOK_PATH) {
            return webhook::handle_webhook(config, &body).await;
        }
    }

    // ========================================================================
    // Verify Slack signature
    // ========================================================================

    if let Err(response) = verify_signature(&body, headers, config) {
        return response;
    }

    info!("Slack signature verified successfully");

    // ========================================================================
    // Route to specialized handlers
    // ========================================================================

    if let Ok(json_body) = serde_json::from_str::<Value>(&body) {
        let body_type = json_body.get("type").and_then(|t| t.as_str()).unwrap_or("");

        if body_type == "url_verification" || body_type == "event_callback" {
            return event_handler::handle_event_callback(config, &json_body).await;
        }
    }

    if parsing::is_interactive_body(&body) {
        return match parsing::parse_interactive_payload(&body) {
            Ok(payload) => interactive_handler::handle_interactive(config, &payload).await,
            Err(e) => {
                error!("Interactive payload parse error: {}", e);
                helpers::err_response(400, &format!("Parse Error: {e}"))
            }
        };
    }

    match slash_handler::handle_slash_command(config, &body).await {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to parse Slack request: {}", e);
            helpers::err_response(400, &format!("Parse Error: {e}"))
        }
    }
}

// ============================================================================
// Request Validation Helpers
// ============================================================================

fn extract_body(payload: &Value) -> Result<String, Value> {
    let Some(body) = payload.get("body") else {
        error!("Request missing body");
        return Err(helpers::err_response(400, "Missing body"));
    };

    let Some(body_str) = body.as_str() else {
        error!("Request body is not a string");
        return Err(helpers::err_response(400, "Invalid body format"));
    };

    Ok(body_str.to_string())
}

fn verify_signature(body: &str, headers: &Value, config: &AppConfig) -> Result<(), Value> {
    let Some(sig) = parsing::get_header_value(headers, "X-Slack-Signature") else {
        error!("Missing X-Slack-Signature header");
        return Err(helpers::err_response(
            401,
            "Missing X-Slack-Signature header",
        ));
    };

    let Some(timestamp) = parsing::get_header_value(headers, "X-Slack-Request-Timestamp") else {
        error!("Missing X-Slack-Request-Timestamp header");
        return Err(helpers::err_response(
            401,
            "Missing X-Slack-Request-Timestamp header",
        ));
    };

    if !signature::verify_slack_signature(body, timestamp, sig, config) {
        error!("Slack signature verification failed");
        return Err(helpers::err_response(401, "Invalid Slack signature"));
    }

    Ok(())
}
