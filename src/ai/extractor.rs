//! Intent extraction: free text in, one or more task intents out.
//!
//! The model is asked for one of two JSON shapes (see `prompt_builder`).
//! Whatever goes wrong (call failure, rate limit exhausted, unusable JSON),
//! `extract` degrades to a deterministic single-task heuristic and never fails.

use std::sync::Arc;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::client::CompletionProvider;
use super::prompt_builder::build_extraction_prompt;
use crate::core::models::{DirectoryContext, IntentItem, TaskIntent};
use crate::errors::BotError;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};
use crate::utils::text::truncate_with_ellipsis;

/// Fallback titles are cut to this many characters.
pub const FALLBACK_TITLE_CHARS: usize = 80;

static LEADING_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][\w .'-]{0,40}?)\s+-\s+\S").expect("static regex compile")
});

#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("completion call failed: {0}")]
    Call(#[from] BotError),

    #[error("completion is not valid JSON: {0}")]
    Unparseable(String),

    #[error("completion is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("completion contains no tasks")]
    Empty,
}

pub struct IntentExtractor {
    provider: Arc<dyn CompletionProvider>,
    retry: RetryPolicy,
}

impl IntentExtractor {
    #[must_use]
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::llm(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Extracts task intent, falling back to the heuristic on any failure.
    pub async fn extract(
        &self,
        message: &str,
        context: &DirectoryContext,
        today: NaiveDate,
    ) -> TaskIntent {
        match self.try_extract(message, context, today).await {
            Ok(intent) => {
                info!(
                    multi = intent.is_multi(),
                    "Extracted intent from completion"
                );
                intent
            }
            Err(e) => {
                warn!(error = %e, "Intent extraction failed, using fallback");
                fallback_intent(message)
            }
        }
    }

    /// Re-extracts the original text and returns only the first task, used when
    /// the user asks for a rewrite of the proposed title and description.
    pub async fn rewrite(
        &self,
        message: &str,
        context: &DirectoryContext,
        today: NaiveDate,
    ) -> IntentItem {
        self.extract(message, context, today)
            .await
            .into_items()
            .into_iter()
            .next()
            .unwrap_or_else(|| fallback_item(message))
    }

    /// # Errors
    ///
    /// Returns the reason extraction could not produce a valid intent.
    pub async fn try_extract(
        &self,
        message: &str,
        context: &DirectoryContext,
        today: NaiveDate,
    ) -> Result<TaskIntent, ExtractionFailure> {
        let prompt = build_extraction_prompt(message, context, today);
        let provider = Arc::clone(&self.provider);

        let raw = retry_with_backoff(
            self.retry,
            || {
                let provider = Arc::clone(&provider);
                let prompt = prompt.clone();
                async move { provider.complete(prompt).await }
            },
            |e: &BotError| {
                let limited = matches!(e, BotError::RateLimited(_));
                if limited {
                    warn!("Completion rate limited, backing off");
                }
                limited
            },
        )
        .await?;

        parse_intent_response(&raw)
    }
}

/// Removes a surrounding Markdown code fence, with or without a language tag.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. `json`) up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parses and validates a completion into a task intent.
///
/// # Errors
///
/// Fails when the text is not JSON or any task lacks a title or description.
pub fn parse_intent_response(raw: &str) -> Result<TaskIntent, ExtractionFailure> {
    let body = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|e| ExtractionFailure::Unparseable(e.to_string()))?;

    if let Some(tasks) = value.get("tasks") {
        let tasks = tasks
            .as_array()
            .ok_or(ExtractionFailure::MissingField("tasks"))?;
        let mut items = tasks
            .iter()
            .map(parse_item)
            .collect::<Result<Vec<_>, _>>()?;
        return match items.len() {
            0 => Err(ExtractionFailure::Empty),
            1 => Ok(TaskIntent::Single(items.remove(0))),
            _ => Ok(TaskIntent::Multi(items)),
        };
    }

    parse_item(&value).map(TaskIntent::Single)
}

fn non_empty_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn parse_item(value: &Value) -> Result<IntentItem, ExtractionFailure> {
    if !value.is_object() {
        return Err(ExtractionFailure::Unparseable(
            "task is not an object".to_string(),
        ));
    }
    let title = non_empty_str(value, "title").ok_or(ExtractionFailure::MissingField("title"))?;
    let description = non_empty_str(value, "description")
        .ok_or(ExtractionFailure::MissingField("description"))?;

    let assignee_names = match value.get("assignee_names") {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Some(Value::String(name)) if !name.trim().is_empty() => vec![name.trim().to_string()],
        _ => non_empty_str(value, "assignee_name").into_iter().collect(),
    };

    Ok(IntentItem {
        title,
        description,
        project_name: non_empty_str(value, "project_name"),
        assignee_names,
        due_date: non_empty_str(value, "due_date"),
    })
}

fn fallback_item(message: &str) -> IntentItem {
    let assignee_names = LEADING_NAME_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .into_iter()
        .collect();

    IntentItem {
        title: truncate_with_ellipsis(message, FALLBACK_TITLE_CHARS),
        description: message.to_string(),
        project_name: None,
        assignee_names,
        due_date: None,
    }
}

/// Deterministic last line of defence: the whole message becomes one task.
#[must_use]
pub fn fallback_intent(message: &str) -> TaskIntent {
    TaskIntent::Single(fallback_item(message))
}
