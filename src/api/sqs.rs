use aws_sdk_sqs::Client as SqsClient;
use tokio::sync::OnceCell;

use crate::core::{config::AppConfig, models::QueuedEvent};
use crate::errors::BotError;

static SQS_CLIENT: OnceCell<SqsClient> = OnceCell::const_new();

async fn client() -> &'static SqsClient {
    SQS_CLIENT
        .get_or_init(|| async {
            let shared_config = aws_config::from_env().load().await;
            SqsClient::new(&shared_config)
        })
        .await
}

/// # Errors
///
/// Returns an error if serialization fails or the message cannot be sent to SQS.
pub async fn send_to_sqs(event: &QueuedEvent, config: &AppConfig) -> Result<(), BotError> {
    let message_body = serde_json::to_string(event)
        .map_err(|e| BotError::ApiError(format!("Failed to serialize event: {e}")))?;

    client()
        .await
        .send_message()
        .queue_url(&config.processing_queue_url)
        .message_body(message_body)
        .send()
        .await
        .map_err(|e| BotError::AwsError(format!("Failed to send message to SQS: {e}")))?;
    Ok(())
}
