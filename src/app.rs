//! Process-wide wiring for the worker.
//!
//! Everything here is built once per warm container and shared by every SQS
//! record the container handles, so sessions and the directory snapshot
//! survive between invocations.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::ai::{IntentExtractor, LlmClient};
use crate::core::config::AppConfig;
use crate::core::models::QueuedEvent;
use crate::core::user_tokens::SsmCredentialStore;
use crate::directory::{DirectoryCache, HttpDirectoryService};
use crate::engine::{ConversationEngine, EngineParts, InMemorySessionStore};
use crate::errors::BotError;
use crate::gateway::BasecampGateway;
use crate::notify::NotificationDispatcher;
use crate::slack::{ChatTransport, SlackClient};
use crate::utils::clock::{Clock, SystemClock};

pub struct App {
    pub engine: ConversationEngine,
    pub notifier: Arc<NotificationDispatcher>,
    pub directory: Arc<DirectoryCache>,
}

impl App {
    /// Builds the production collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Fails when an HTTP client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, BotError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.timezone));

        let llm = Arc::new(LlmClient::new(
            config.openai_api_key.clone(),
            config.openai_org_id.clone(),
            config.model_name(),
        ));
        let directory_service = Arc::new(HttpDirectoryService::new(
            &config.directory_api_url,
            config.directory_api_key.clone(),
        )?);
        let directory = Arc::new(
            DirectoryCache::new(
                directory_service,
                Arc::clone(&clock),
                Duration::from_secs(config.directory_cache_ttl_secs),
            )
            .with_allowed_users(config.allowed_user_ids.clone()),
        );
        let gateway = Arc::new(BasecampGateway::new(
            &config.basecamp_api_url,
            &config.basecamp_user_agent,
        )?);
        let chat: Arc<dyn ChatTransport> =
            Arc::new(SlackClient::new(config.slack_bot_token.clone()));
        let notifier = Arc::new(NotificationDispatcher::new(
            Arc::clone(&chat),
            Arc::clone(&directory),
            config.default_channel_id.clone(),
        ));

        let engine = ConversationEngine::new(EngineParts {
            extractor: IntentExtractor::new(llm),
            gateway,
            directory: Arc::clone(&directory),
            credentials: Arc::new(SsmCredentialStore::new(
                config.user_token_param_prefix.clone(),
            )),
            sessions: Arc::new(InMemorySessionStore::new()),
            chat,
            notifier: Arc::clone(&notifier),
            clock,
        });

        info!(model = %config.model_name(), "Worker app initialised");
        Ok(Self {
            engine,
            notifier,
            directory,
        })
    }

    /// Routes one queued event to the engine or the webhook fan-out.
    ///
    /// # Errors
    ///
    /// Propagates engine failures that escape its own error handling.
    #[instrument(skip(self, event), fields(correlation_id = %event.correlation_id()))]
    pub async fn dispatch(&self, event: QueuedEvent) -> Result<(), BotError> {
        match event {
            QueuedEvent::Message {
                user_id,
                channel_id,
                text,
                ..
            } => {
                self.engine
                    .handle_message(&user_id, &channel_id, &text)
                    .await
            }
            QueuedEvent::Action {
                user_id,
                channel_id,
                action_id,
                ..
            } => {
                self.engine
                    .handle_action(&user_id, &channel_id, &action_id)
                    .await
            }
            QueuedEvent::Command {
                user_id,
                channel_id,
                command,
                text,
                ..
            } => {
                self.engine
                    .handle_command(&user_id, &channel_id, &command, &text)
                    .await
            }
            QueuedEvent::WorkItem { event, .. } => {
                self.notifier.handle_event(&event).await;
                Ok(())
            }
        }
    }
}
