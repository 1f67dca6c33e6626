//! Response builders shared by the API handlers.

use serde_json::{Value, json};

use crate::slack::response_builder::create_ephemeral_payload;

/// Returns a 200 OK response with an empty JSON body.
#[must_use]
pub fn ok_empty() -> Value {
    json!({ "statusCode": 200, "body": "{}" })
}

/// Returns a 200 OK response with an ephemeral Slack message.
#[must_use]
pub fn ok_ephemeral(text: &str) -> Value {
    json!({
        "statusCode": 200,
        "body": create_ephemeral_payload(text).to_string()
    })
}

/// Returns a 200 OK response with a plain text body.
#[must_use]
pub fn ok_text(text: &str) -> Value {
    json!({ "statusCode": 200, "body": text })
}

/// Returns an error response with the given status code and message.
#[must_use]
pub fn err_response(status_code: u16, message: &str) -> Value {
    json!({
        "statusCode": status_code,
        "body": json!({ "error": message }).to_string()
    })
}

/// First eight characters of a correlation id, for user-facing references.
#[must_use]
pub fn short_ref(correlation_id: &str) -> &str {
    correlation_id
        .char_indices()
        .nth(8)
        .map_or(correlation_id, |(i, _)| &correlation_id[..i])
}
