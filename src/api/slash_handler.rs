//! Handler for Slack slash commands (`/cancel`, `/help`, `/status`, `/refresh`).

use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use super::helpers::{ok_ephemeral, short_ref};
use super::parsing::parse_slash_command;
use super::sqs;
use crate::core::config::AppConfig;
use crate::core::models::QueuedEvent;
use crate::errors::BotError;
use crate::slack::response_builder::{HELP_TEXT, command_ack};

/// Handle a slash command from Slack.
///
/// `/help` is answered inline; everything else is queued for the worker and
/// acknowledged ephemerally.
///
/// # Errors
/// Returns an error if the body cannot be parsed.
pub async fn handle_slash_command(config: &AppConfig, body: &str) -> Result<Value, BotError> {
    let slash = parse_slash_command(body)?;

    if slash.command == "/help" {
        return Ok(ok_ephemeral(HELP_TEXT));
    }

    let correlation_id = Uuid::new_v4().to_string();
    info!(
        command = %slash.command,
        correlation_id = %correlation_id,
        "Slash command queued"
    );

    let queued = QueuedEvent::Command {
        correlation_id: correlation_id.clone(),
        user_id: slash.user_id,
        channel_id: slash.channel_id,
        command: slash.command.clone(),
        text: slash.text,
    };

    if let Err(e) = sqs::send_to_sqs(&queued, config).await {
        error!(
            "Failed to enqueue command (correlation_id={}): {}",
            correlation_id, e
        );
        return Ok(ok_ephemeral(&format!(
            "Something went wrong. Please try again. (ref: {})",
            short_ref(&correlation_id)
        )));
    }

    Ok(ok_ephemeral(command_ack(&slash.command)))
}
