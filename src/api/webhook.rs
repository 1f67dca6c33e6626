//! Work-management webhooks (`/webhooks/work-items`).
//!
//! Basecamp posts one JSON document per recording event. The few kinds the bot
//! relays are normalised into a [`WorkItemEvent`]; everything else is acked and
//! dropped.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::helpers::{err_response, ok_empty};
use super::sqs;
use crate::core::config::AppConfig;
use crate::core::models::{PersonRef, QueuedEvent, WorkItemEvent, WorkItemEventKind};
use crate::utils::ids::{opt_string_or_number, string_or_number};

#[derive(Debug, Deserialize)]
struct WebhookBody {
    kind: String,
    recording: Recording,
    #[serde(default)]
    creator: Option<WebhookPerson>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    app_url: Option<String>,
    #[serde(default)]
    bucket: Option<Bucket>,
    #[serde(default)]
    parent: Option<Parent>,
    #[serde(default)]
    assignees: Vec<WebhookPerson>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Parent {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    app_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookPerson {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "email")]
    email_address: String,
}

impl From<WebhookPerson> for PersonRef {
    fn from(p: WebhookPerson) -> Self {
        PersonRef {
            id: p.id,
            name: p.name,
            email: p.email_address,
        }
    }
}

fn event_kind(kind: &str) -> Option<WorkItemEventKind> {
    match kind {
        "todo_created" => Some(WorkItemEventKind::Created),
        "todo_assignment_changed" => Some(WorkItemEventKind::AssigneesChanged),
        "todo_completed" => Some(WorkItemEventKind::Completed),
        "comment_created" => Some(WorkItemEventKind::Commented),
        _ => None,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Normalises a webhook body. `Ok(None)` for kinds the bot doesn't relay.
///
/// # Errors
///
/// Fails when the body isn't a recording event.
pub fn parse_webhook(body: &Value) -> Result<Option<WorkItemEvent>, serde_json::Error> {
    let body = WebhookBody::deserialize(body)?;
    let Some(kind) = event_kind(&body.kind) else {
        return Ok(None);
    };

    let recording = body.recording;
    let (project_id, project_name) = recording
        .bucket
        .map_or((None, None), |b| (Some(b.id), non_empty(b.name)));

    let event = match kind {
        WorkItemEventKind::Commented => {
            let parent = recording.parent;
            WorkItemEvent {
                kind,
                work_item_id: recording.id,
                parent_id: parent.as_ref().map(|p| p.id.clone()),
                project_id,
                project_name,
                title: parent
                    .as_ref()
                    .and_then(|p| p.title.clone())
                    .unwrap_or_default(),
                url: parent
                    .and_then(|p| non_empty(p.app_url))
                    .or_else(|| non_empty(recording.app_url)),
                assignees: Vec::new(),
                creator: body.creator.map(PersonRef::from),
                comment: non_empty(recording.content),
            }
        }
        _ => WorkItemEvent {
            kind,
            work_item_id: recording.id,
            parent_id: None,
            project_id,
            project_name,
            title: non_empty(recording.title)
                .or_else(|| non_empty(recording.content))
                .unwrap_or_default(),
            url: non_empty(recording.app_url),
            assignees: recording
                .assignees
                .into_iter()
                .map(PersonRef::from)
                .collect(),
            creator: body.creator.map(PersonRef::from),
            comment: None,
        },
    };
    Ok(Some(event))
}

/// Handle a webhook POST. Always acks quickly; malformed JSON is a 400.
pub async fn handle_webhook(config: &AppConfig, body: &str) -> Value {
    let json: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            error!("Webhook body is not JSON: {}", e);
            return err_response(400, "Invalid JSON");
        }
    };

    let event = match parse_webhook(&json) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!("Ignoring webhook kind");
            return ok_empty();
        }
        Err(e) => {
            error!("Webhook body is not a recording event: {}", e);
            return err_response(400, "Unrecognised webhook body");
        }
    };

    let correlation_id = Uuid::new_v4().to_string();
    info!(
        correlation_id = %correlation_id,
        work_item_id = %event.work_item_id,
        kind = ?event.kind,
        "Work item event queued"
    );
    let queued = QueuedEvent::WorkItem {
        correlation_id: correlation_id.clone(),
        event,
    };
    if let Err(e) = sqs::send_to_sqs(&queued, config).await {
        error!(correlation_id = %correlation_id, "enqueue failed: {}", e);
    }
    ok_empty()
}
