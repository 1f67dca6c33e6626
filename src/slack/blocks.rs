//! Block Kit payloads for the task wizard.
//!
//! Every button's `action_id` is its callback data (`project_12`,
//! `person_page_2`, ...), so the worker can route a click without looking at
//! the rest of the payload.

use chrono::NaiveDate;
use serde_json::{Value, json};

use crate::core::models::{BatchOutcome, ResolvedTask};
use crate::utils::text::truncate_with_ellipsis;

/// Options shown per picker page.
pub const PAGE_SIZE: usize = 8;

/// Slack caps button labels at 75 characters.
const MAX_BUTTON_LABEL: usize = 72;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption {
    pub id: String,
    pub label: String,
}

impl PickerOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Number of pages needed for `len` options (at least one).
#[must_use]
pub fn page_count(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE).max(1)
}

/// Clamps `page` into range and returns it with the slice bounds.
#[must_use]
pub fn page_bounds(len: usize, page: usize) -> (usize, usize, usize) {
    let page = page.min(page_count(len) - 1);
    let start = page * PAGE_SIZE;
    let end = (start + PAGE_SIZE).min(len);
    (page, start, end)
}

fn button(text: &str, action_id: &str, style: Option<&str>) -> Value {
    let mut b = json!({
        "type": "button",
        "text": {"type": "plain_text", "text": truncate_with_ellipsis(text, MAX_BUTTON_LABEL)},
        "action_id": action_id,
        "value": action_id,
    });
    if let Some(style) = style {
        b["style"] = Value::String(style.to_string());
    }
    b
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": text}
    })
}

fn context(text: &str) -> Value {
    json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": text}]
    })
}

fn format_due(task: &ResolvedTask) -> String {
    match (task.due_resolved, task.due_on) {
        (true, Some(d)) => d.format("%a %b %-d, %Y").to_string(),
        (true, None) => "no due date".to_string(),
        (false, _) => "_not set_".to_string(),
    }
}

/// Human-readable summary of a task's resolved fields.
#[must_use]
pub fn task_details(task: &ResolvedTask) -> String {
    let project = task.project_name.as_deref().unwrap_or("_not set_");
    let assignee = match (&task.assignee_name, &task.assignee_id) {
        (Some(name), Some(_)) => name.clone(),
        (Some(name), None) => format!("{name} _(not found in workspace)_"),
        _ => "_not set_".to_string(),
    };
    format!(
        "*Project:* {project}\n*Assignee:* {assignee}\n*Due:* {}",
        format_due(task)
    )
}

/// Confirmation card with confirm / rewrite / cancel buttons.
#[must_use]
pub fn confirmation_blocks(task: &ResolvedTask) -> Value {
    json!([
        section(&format!("*{}*\n{}", task.title, task.description)),
        section(&task_details(task)),
        {
            "type": "actions",
            "elements": [
                button("Create task", "confirm_task", Some("primary")),
                button("Rewrite", "rewrite_task", None),
                button("Cancel", "cancel_task", Some("danger")),
            ]
        }
    ])
}

/// A paginated picker. Selection buttons use `{prefix}_{id}`, navigation
/// buttons `{prefix}_page_{n}`; `extra` buttons are appended after the options.
#[must_use]
pub fn picker_blocks(
    prompt: &str,
    options: &[PickerOption],
    page: usize,
    prefix: &str,
    extra: &[(&str, &str)],
    warning: Option<&str>,
) -> Value {
    let (page, start, end) = page_bounds(options.len(), page);
    let pages = page_count(options.len());

    let mut blocks = vec![section(prompt)];
    if let Some(w) = warning {
        blocks.push(context(&format!(":warning: {w}")));
    }

    let mut choices: Vec<Value> = options[start..end]
        .iter()
        .map(|o| button(&o.label, &format!("{prefix}_{}", o.id), None))
        .collect();
    for (label, action_id) in extra {
        choices.push(button(label, action_id, None));
    }
    if !choices.is_empty() {
        blocks.push(json!({"type": "actions", "elements": choices}));
    }

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(button("« Previous", &format!("{prefix}_page_{}", page - 1), None));
    }
    if page + 1 < pages {
        nav.push(button("Next »", &format!("{prefix}_page_{}", page + 1), None));
    }
    nav.push(button("Cancel", "cancel_task", Some("danger")));
    blocks.push(json!({"type": "actions", "elements": nav}));

    if pages > 1 {
        blocks.push(context(&format!("Page {} of {pages}", page + 1)));
    }
    Value::Array(blocks)
}

/// Plain-text due date prompt; the answer arrives as a normal message.
#[must_use]
pub fn due_date_prompt(title: &str, today: NaiveDate) -> String {
    format!(
        "When is *{title}* due? Reply with a date like `tomorrow`, `friday`, `in 3 days` or `{}`, or `skip` for no due date.",
        today.format("%Y-%m-%d")
    )
}

pub const INVALID_DUE_DATE: &str = "I couldn't understand that date. Try `tomorrow`, `next friday`, `in 3 days`, a date like `2025-03-14`, or `skip`.";

/// Message posted after a single task is created.
#[must_use]
pub fn created_text(task: &ResolvedTask, url: &str, warning: Option<&str>) -> String {
    let mut text = format!(":white_check_mark: Created *{}*", task.title);
    if let Some(project) = &task.project_name {
        text.push_str(&format!(" in {project}"));
    }
    if !url.is_empty() {
        text.push_str(&format!("\n<{url}|Open in workspace>"));
    }
    if let Some(w) = warning {
        text.push_str(&format!("\n:warning: {w}"));
    }
    text
}

/// One aggregate summary for a batch run, entries in input order.
#[must_use]
pub fn batch_summary(outcomes: &[BatchOutcome]) -> (String, Value) {
    let created = outcomes.iter().filter(|o| o.is_success()).count();
    let headline = format!("Created {created} of {} tasks", outcomes.len());

    let lines: Vec<String> = outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| match &outcome.result {
            Ok(item) if item.work_item.url.is_empty() => {
                format!("{}. :white_check_mark: {}", i + 1, outcome.title)
            }
            Ok(item) => format!(
                "{}. :white_check_mark: <{}|{}>",
                i + 1,
                item.work_item.url,
                outcome.title
            ),
            Err(reason) => format!("{}. :x: {} ({reason})", i + 1, outcome.title),
        })
        .collect();

    let blocks = json!([
        section(&format!("*{headline}*")),
        section(&lines.join("\n")),
    ]);
    (format!("{headline}\n{}", lines.join("\n")), blocks)
}
