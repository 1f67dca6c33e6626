use openai_api_rs::v1::error::APIError;
use slack_morphism::errors::SlackClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Failed to access Slack API: {0}")]
    ApiError(String),

    #[error("Failed to access OpenAI API: {0}")]
    OpenAIError(String),

    #[error("Rate limited by upstream service: {0}")]
    RateLimited(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Failed to interact with AWS services: {0}")]
    AwsError(String),

    #[error("Work-management API error (status {status}): {message}")]
    GatewayError { status: u16, message: String },

    #[error("Failed to access people directory: {0}")]
    DirectoryError(String),

    #[error("User {0} is not authorized")]
    NotAuthorized(String),

    #[error("No stored credential for user {0}")]
    MissingCredential(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("{0}")]
    GeneralError(String),
}

impl BotError {
    /// Whether retrying the same call can reasonably succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::RateLimited(_) | BotError::HttpError(_) => true,
            BotError::GatewayError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Plain-language text that is safe to show to an end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            BotError::GatewayError { status: 401 | 403, .. } => {
                "I couldn't access the project workspace with your account. Please reconnect and try again."
            }
            BotError::GatewayError { status: 404, .. } => {
                "That project or list no longer exists. Please start again."
            }
            BotError::GatewayError { .. } | BotError::HttpError(_) | BotError::RateLimited(_) => {
                "The project workspace didn't respond properly. Please try again in a moment."
            }
            BotError::DirectoryError(_) => {
                "I couldn't load the team directory right now. Please try again shortly."
            }
            BotError::NotAuthorized(_) => "Sorry, you're not allowed to create tasks with this bot.",
            BotError::MissingCredential(_) => {
                "Your project workspace account isn't connected yet. Please connect it and try again."
            }
            BotError::ValidationError(_) => "That input didn't look right. Please try again.",
            _ => "Something went wrong while handling your request. Please try again.",
        }
    }
}

impl From<SlackClientError> for BotError {
    fn from(error: SlackClientError) -> Self {
        BotError::ApiError(error.to_string())
    }
}

impl From<reqwest::Error> for BotError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return BotError::GatewayError {
                status: status.as_u16(),
                message: error.to_string(),
            };
        }
        BotError::HttpError(error.to_string())
    }
}

impl From<anyhow::Error> for BotError {
    fn from(error: anyhow::Error) -> Self {
        BotError::GeneralError(error.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(error: serde_json::Error) -> Self {
        BotError::ParseError(error.to_string())
    }
}

// Generic implementation for AWS SDK errors
impl<E> From<aws_sdk_sqs::error::SdkError<E>> for BotError
where
    E: std::fmt::Display,
{
    fn from(error: aws_sdk_sqs::error::SdkError<E>) -> Self {
        BotError::AwsError(error.to_string())
    }
}

impl From<APIError> for BotError {
    fn from(error: APIError) -> Self {
        BotError::OpenAIError(format!("OpenAI API error: {error}"))
    }
}
