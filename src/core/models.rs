use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::ids::{opt_string_or_number, string_or_number};

// ============================================================================
// Directory entities
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Busy,
    Away,
    OutOfOffice,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Availability {
    /// Parses the keyword a user types after `/status`.
    #[must_use]
    pub fn from_keyword(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" | "online" | "here" => Some(Self::Available),
            "busy" | "dnd" => Some(Self::Busy),
            "away" | "brb" => Some(Self::Away),
            "ooo" | "out" | "out_of_office" | "vacation" => Some(Self::OutOfOffice),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Away => "away",
            Self::OutOfOffice => "out of office",
            Self::Unknown => "unknown",
        }
    }
}

/// A person from the people directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub chat_user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub availability: Availability,
}

/// Project id to notification channel id.
pub type ProjectChannelMapping = HashMap<String, String>;

// ============================================================================
// Work-management entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub todoset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default, alias = "email_address")]
    pub email: String,
}

pub type WorkItemAssignee = Member;

/// A created to-do as reported back by the work-management API.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub assignees: Vec<WorkItemAssignee>,
    pub due_on: Option<NaiveDate>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub assignee_ids: Vec<String>,
    pub due_on: Option<NaiveDate>,
}

/// Per-user authentication against the work-management API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceAuth {
    pub access_token: String,
    pub account_id: String,
}

// ============================================================================
// Intent & resolution
// ============================================================================

/// One task as extracted from free text, before any id resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub assignee_names: Vec<String>,
    #[serde(default, rename = "due_date")]
    pub due_date: Option<String>,
}

impl IntentItem {
    #[must_use]
    pub fn first_assignee(&self) -> Option<&str> {
        self.assignee_names
            .iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskIntent {
    Single(IntentItem),
    Multi(Vec<IntentItem>),
}

impl TaskIntent {
    #[must_use]
    pub fn into_items(self) -> Vec<IntentItem> {
        match self {
            TaskIntent::Single(item) => vec![item],
            TaskIntent::Multi(items) => items,
        }
    }

    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(self, TaskIntent::Multi(items) if items.len() > 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

/// Context handed to the extractor so the model can use real names.
#[derive(Debug, Clone, Default)]
pub struct DirectoryContext {
    pub projects: Vec<NamedRef>,
    pub people: Vec<PersonSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSummary {
    pub name: String,
    pub email: String,
}

/// A task whose names have been turned into ids (or left absent).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTask {
    pub title: String,
    pub description: String,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub todo_list_id: Option<String>,
    pub assignee_id: Option<String>,
    pub assignee_email: Option<String>,
    pub assignee_name: Option<String>,
    pub chat_user_id: Option<String>,
    pub due_on: Option<NaiveDate>,
    /// True once the due date has been settled, including an explicit "no due date".
    pub due_resolved: bool,
}

/// A created work item plus any anomaly worth telling the user about.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWorkItem {
    pub work_item: WorkItem,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationFailure {
    /// The task never got a project, so no creation was attempted.
    NoProject,
    /// The gateway rejected the creation; holds a user-safe explanation.
    Gateway(String),
}

impl fmt::Display for CreationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationFailure::NoProject => write!(f, "no project"),
            CreationFailure::Gateway(reason) => write!(f, "{reason}"),
        }
    }
}

/// One entry of a batch creation summary, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub title: String,
    pub result: Result<CreatedWorkItem, CreationFailure>,
}

impl BatchOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

// ============================================================================
// Chat plumbing
// ============================================================================

/// Opaque handle to a posted chat message, replayed for threading and cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.channel, self.ts)
    }
}

// ============================================================================
// Queue payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemEventKind {
    Created,
    AssigneesChanged,
    Completed,
    Commented,
}

/// A lifecycle event reported by the work-management webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemEvent {
    pub kind: WorkItemEventKind,
    pub work_item_id: String,
    /// For comments: the work item the comment belongs to.
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub assignees: Vec<PersonRef>,
    #[serde(default)]
    pub creator: Option<PersonRef>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl WorkItemEvent {
    /// The work item whose notification thread this event belongs to.
    #[must_use]
    pub fn thread_key(&self) -> &str {
        match self.kind {
            WorkItemEventKind::Commented => self
                .parent_id
                .as_deref()
                .unwrap_or(self.work_item_id.as_str()),
            _ => self.work_item_id.as_str(),
        }
    }
}

/// Everything the API Lambda hands to the worker through SQS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueuedEvent {
    Message {
        correlation_id: String,
        user_id: String,
        channel_id: String,
        text: String,
    },
    Action {
        correlation_id: String,
        user_id: String,
        channel_id: String,
        action_id: String,
        #[serde(default)]
        message_ts: Option<String>,
    },
    Command {
        correlation_id: String,
        user_id: String,
        channel_id: String,
        command: String,
        #[serde(default)]
        text: String,
    },
    WorkItem {
        correlation_id: String,
        event: WorkItemEvent,
    },
}

impl QueuedEvent {
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        match self {
            QueuedEvent::Message { correlation_id, .. }
            | QueuedEvent::Action { correlation_id, .. }
            | QueuedEvent::Command { correlation_id, .. }
            | QueuedEvent::WorkItem { correlation_id, .. } => correlation_id,
        }
    }
}
