/// TaskBot - a Slack bot that turns free-text requests into Basecamp to-dos.
///
/// This crate implements a two-Lambda architecture:
/// 1. An API Lambda that verifies Slack requests and work-management webhooks,
///    normalises them into queued events and acks immediately
/// 2. A Worker Lambda that runs the per-user conversation wizard and relays
///    work-item lifecycle events back to Slack
///
/// # Architecture
///
/// The system uses:
/// - AWS Lambda for serverless execution
/// - SQS for event queuing between Lambdas
/// - slack-morphism and reqwest for Slack API interactions
/// - openai-api-rs for intent extraction
/// - Tokio for async runtime
///
/// # Example
///
/// ```no_run
/// use taskbot::app::App;
/// use taskbot::core::config::AppConfig;
/// use taskbot::core::models::QueuedEvent;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     taskbot::setup_logging();
///
///     let config = AppConfig::from_env()?;
///     let app = App::from_config(&config)?;
///
///     app.dispatch(QueuedEvent::Message {
///         correlation_id: "demo".into(),
///         user_id: "U123".into(),
///         channel_id: "D123".into(),
///         text: "Ada - draft the launch brief by friday".into(),
///     })
///     .await?;
///
///     Ok(())
/// }
/// ```
// Module declarations
pub mod ai;
pub mod api;
pub mod app;
pub mod core;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod notify;
pub mod resolve;
pub mod slack;
pub mod utils;
pub mod worker;

pub use errors::BotError;

/// Configure structured logging with JSON format for AWS Lambda environments.
///
/// This function sets up tracing-subscriber with a JSON formatter suitable for
/// `CloudWatch` Logs integration. It should be called at the start of each Lambda
/// handler.
///
/// # Example
///
/// ```
/// // Initialize structured logging at the start of your Lambda handler
/// taskbot::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}
