//! Immediate responses returned to Slack from the API Lambda.

use serde_json::{Value, json};

/// Create a JSON payload for an ephemeral response
///
/// Ephemeral messages are only visible to the user who triggered the command.
///
/// # Examples
///
/// ```
/// use taskbot::slack::response_builder::create_ephemeral_payload;
///
/// let payload = create_ephemeral_payload("Working on it...");
/// assert_eq!(payload["response_type"], "ephemeral");
/// ```
#[must_use]
pub fn create_ephemeral_payload(text: &str) -> Value {
    json!({
        "text": text,
        "response_type": "ephemeral"
    })
}

/// Usage text for `/help`.
pub const HELP_TEXT: &str = "*TaskBot*\n\
Send me a message describing what needs doing and I'll turn it into a to-do.\n\
• One task: `Fix the login page for the Website project, Ada, by friday`\n\
• Several tasks: one line per person, e.g. `Ada - draft the brief. book the venue.`\n\
Commands:\n\
• `/cancel` stop the current task\n\
• `/status available|busy|away|ooo` set your availability\n\
• `/refresh` reload the people directory\n\
• `/help` show this message";

/// Acknowledgement text for a slash command that is processed asynchronously.
#[must_use]
pub fn command_ack(command: &str) -> &'static str {
    match command {
        "/cancel" => "Cancelling...",
        "/refresh" => "Refreshing the directory...",
        "/status" => "Updating your status...",
        _ => "On it...",
    }
}
