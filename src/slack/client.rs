//! Slack API client module
//!
//! Encapsulates the Slack calls the bot needs (post, DM, delete) with retry
//! logic and error handling.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::prelude::{SlackApiChatDeleteRequest, SlackApiConversationsOpenRequest};
use slack_morphism::{SlackApiToken, SlackApiTokenValue, SlackChannelId, SlackTs, SlackUserId};
use std::time::Duration;
use tracing::{debug, warn};

use super::ChatTransport;
use crate::core::models::MessageRef;
use crate::errors::BotError;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

// Build the Slack client connector safely without panicking.
// If connector construction fails, store None and surface a BotError at call sites.
static SLACK_CLIENT: std::sync::LazyLock<Option<SlackHyperClient>> =
    std::sync::LazyLock::new(|| match SlackClientHyperConnector::new() {
        Ok(connector) => Some(SlackHyperClient::new(connector)),
        Err(e) => {
            warn!("Failed to create Slack HTTP connector: {}", e);
            None
        }
    });

static HTTP_CLIENT: std::sync::LazyLock<Client> = std::sync::LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
});

fn connector() -> Result<&'static SlackHyperClient, BotError> {
    SLACK_CLIENT
        .as_ref()
        .ok_or_else(|| BotError::GeneralError("Slack HTTP connector not initialized".to_string()))
}

/// Builds the `chat.postMessage` body.
#[must_use]
pub fn build_post_payload(
    channel: &str,
    text: &str,
    blocks: Option<&Value>,
    thread_ts: Option<&str>,
) -> Value {
    let mut payload = json!({
        "channel": channel,
        "text": text,
    });
    if let Some(b) = blocks {
        payload["blocks"] = b.clone();
    }
    if let Some(ts) = thread_ts {
        payload["thread_ts"] = Value::String(ts.to_string());
    }
    payload
}

/// Reads the posted message reference out of a `chat.postMessage` response.
///
/// # Errors
///
/// Returns `RateLimited` for Slack's `ratelimited` code and `ApiError` for any
/// other `ok: false` response.
pub fn parse_post_response(body: &Value) -> Result<MessageRef, BotError> {
    if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        let code = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if code == "ratelimited" {
            return Err(BotError::RateLimited("chat.postMessage".to_string()));
        }
        return Err(BotError::ApiError(format!("chat.postMessage error: {code}")));
    }

    let channel = body.get("channel").and_then(Value::as_str);
    let ts = body.get("ts").and_then(Value::as_str);
    match (channel, ts) {
        (Some(channel), Some(ts)) => Ok(MessageRef {
            channel: channel.to_string(),
            ts: ts.to_string(),
        }),
        _ => Err(BotError::ApiError(
            "chat.postMessage response missing channel or ts".to_string(),
        )),
    }
}

/// Slack API client with retry logic and error handling
pub struct SlackClient {
    token: SlackApiToken,
    retry: RetryPolicy,
}

impl SlackClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
            retry: RetryPolicy::http(),
        }
    }

    #[must_use]
    pub fn token(&self) -> &SlackApiToken {
        &self.token
    }

    /// # Errors
    ///
    /// Returns an error if the Slack API call fails.
    pub async fn get_user_im_channel(&self, user_id: &str) -> Result<String, BotError> {
        retry_with_backoff(
            self.retry,
            || async move {
                let session = connector()?.open_session(&self.token);
                let open_req = SlackApiConversationsOpenRequest::new()
                    .with_users(vec![SlackUserId(user_id.to_string())]);

                let result = session.conversations_open(&open_req).await?;
                Ok(result.channel.id.0)
            },
            BotError::is_retryable,
        )
        .await
    }
}

#[async_trait]
impl ChatTransport for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<&Value>,
        thread_ts: Option<&str>,
    ) -> Result<MessageRef, BotError> {
        let payload = build_post_payload(channel, text, blocks, thread_ts);
        let payload = &payload;

        retry_with_backoff(
            self.retry,
            || async move {
                let resp = HTTP_CLIENT
                    .post(POST_MESSAGE_URL)
                    .bearer_auth(&self.token.token_value.0)
                    .json(payload)
                    .send()
                    .await
                    .map_err(|e| BotError::HttpError(format!("Failed to post message: {e}")))?;

                let status = resp.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(BotError::RateLimited("chat.postMessage".to_string()));
                }
                if !status.is_success() {
                    return Err(BotError::HttpError(format!("chat.postMessage HTTP {status}")));
                }

                let body: Value = resp.json().await.map_err(|e| {
                    BotError::ParseError(format!("chat.postMessage JSON parse error: {e}"))
                })?;
                let posted = parse_post_response(&body)?;
                debug!(message = %posted, "Posted Slack message");
                Ok(posted)
            },
            BotError::is_retryable,
        )
        .await
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<MessageRef, BotError> {
        let im_channel = self.get_user_im_channel(user_id).await?;
        self.post_message(&im_channel, text, None, None).await
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), BotError> {
        let session = connector()?.open_session(&self.token);
        let delete_req = SlackApiChatDeleteRequest::new(
            SlackChannelId(message.channel.clone()),
            SlackTs(message.ts.clone()),
        );
        session.chat_delete(&delete_req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_includes_optional_parts() {
        let blocks = json!([{"type": "divider"}]);
        let payload = build_post_payload("C1", "hi", Some(&blocks), Some("123.4"));
        assert_eq!(payload["channel"], "C1");
        assert_eq!(payload["thread_ts"], "123.4");
        assert_eq!(payload["blocks"][0]["type"], "divider");

        let bare = build_post_payload("C1", "hi", None, None);
        assert!(bare.get("blocks").is_none());
        assert!(bare.get("thread_ts").is_none());
    }

    #[test]
    fn post_response_yields_message_ref() {
        let body = json!({"ok": true, "channel": "C1", "ts": "1700000000.0001"});
        let posted = parse_post_response(&body).unwrap();
        assert_eq!(posted.channel, "C1");
        assert_eq!(posted.ts, "1700000000.0001");
    }

    #[test]
    fn post_response_errors_are_classified() {
        let limited = parse_post_response(&json!({"ok": false, "error": "ratelimited"}));
        assert!(matches!(limited, Err(BotError::RateLimited(_))));

        let missing = parse_post_response(&json!({"ok": false, "error": "channel_not_found"}));
        assert!(matches!(missing, Err(ref e) if !e.is_retryable()));
    }
}
