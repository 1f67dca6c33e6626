//! All Slack-specific functionality

pub mod blocks;
pub mod client;
pub mod response_builder;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::models::MessageRef;
use crate::errors::BotError;

// Re-export main types for convenience
pub use client::SlackClient;

/// Outbound chat operations. Message references are opaque and only replayed
/// for threading and cleanup.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<&Value>,
        thread_ts: Option<&str>,
    ) -> Result<MessageRef, BotError>;

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<MessageRef, BotError>;

    async fn delete_message(&self, message: &MessageRef) -> Result<(), BotError>;
}
