//! Relays work-management lifecycle events to chat.

use tracing::{debug, info, instrument};

use super::NotificationDispatcher;
use crate::core::models::{PersonRef, WorkItemEvent, WorkItemEventKind};
use crate::directory::DirectorySnapshot;
use crate::utils::text::{html_to_plain, truncate_with_ellipsis};

const COMMENT_EXCERPT_CHARS: usize = 500;

/// Chat identity for a person named in an event: external id first, then email.
fn chat_id_for(snapshot: Option<&DirectorySnapshot>, person: &PersonRef) -> Option<String> {
    let snapshot = snapshot?;
    person
        .id
        .as_deref()
        .and_then(|id| snapshot.person_by_external_id(id))
        .or_else(|| snapshot.person_by_email(&person.email))
        .and_then(|p| p.chat_user_id.clone())
}

fn mention(snapshot: Option<&DirectorySnapshot>, person: &PersonRef) -> String {
    match chat_id_for(snapshot, person) {
        Some(id) => format!("<@{id}>"),
        None if !person.name.is_empty() => person.name.clone(),
        None => "someone".to_string(),
    }
}

fn linked_title(event: &WorkItemEvent) -> String {
    let title = if event.title.is_empty() {
        "a to-do"
    } else {
        event.title.as_str()
    };
    match &event.url {
        Some(url) if !url.is_empty() => format!("<{url}|{title}>"),
        _ => format!("*{title}*"),
    }
}

fn assignee_list(snapshot: Option<&DirectorySnapshot>, event: &WorkItemEvent) -> String {
    if event.assignees.is_empty() {
        return "nobody".to_string();
    }
    event
        .assignees
        .iter()
        .map(|a| mention(snapshot, a))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Channel text for an event.
#[must_use]
pub fn event_text(snapshot: Option<&DirectorySnapshot>, event: &WorkItemEvent) -> String {
    let actor = event
        .creator
        .as_ref()
        .map_or_else(|| "Someone".to_string(), |c| mention(snapshot, c));
    let title = linked_title(event);

    match event.kind {
        WorkItemEventKind::Created => {
            let mut text = format!(":new: {actor} created {title}");
            if let Some(project) = &event.project_name {
                text.push_str(&format!(" in {project}"));
            }
            text.push_str(&format!("\nAssigned to: {}", assignee_list(snapshot, event)));
            text
        }
        WorkItemEventKind::AssigneesChanged => {
            format!(
                ":busts_in_silhouette: {title} is now assigned to {}",
                assignee_list(snapshot, event)
            )
        }
        WorkItemEventKind::Completed => format!(":white_check_mark: {actor} completed {title}"),
        WorkItemEventKind::Commented => {
            let body = event
                .comment
                .as_deref()
                .map(html_to_plain)
                .unwrap_or_default();
            let mut text = format!(":speech_balloon: {actor} commented on {title}");
            if !body.is_empty() {
                text.push_str("\n>");
                text.push_str(&truncate_with_ellipsis(&body, COMMENT_EXCERPT_CHARS).replace('\n', "\n>"));
            }
            text
        }
    }
}

/// DM text for someone (newly) assigned through a webhook event.
#[must_use]
pub fn assigned_dm_text(event: &WorkItemEvent) -> String {
    let mut text = format!(":clipboard: You've been assigned {}", linked_title(event));
    if let Some(project) = &event.project_name {
        text.push_str(&format!(" in {project}"));
    }
    text
}

impl NotificationDispatcher {
    /// Fans one lifecycle event out to the project channel, threads and DMs.
    #[instrument(skip(self, event), fields(work_item_id = %event.work_item_id, kind = ?event.kind))]
    pub async fn handle_event(&self, event: &WorkItemEvent) {
        let snapshot = self.directory_snapshot().await;
        let snapshot = snapshot.as_deref();
        let channel = self.channel_for(snapshot, event.project_id.as_deref());
        let text = event_text(snapshot, event);

        match event.kind {
            WorkItemEventKind::Created => {
                match channel {
                    Some(channel) => {
                        if let Some(posted) = self.post(&channel, &text, None).await {
                            self.threads.remember(&event.work_item_id, posted).await;
                        }
                    }
                    None => debug!("No channel for project, skipping channel post"),
                }
                self.dm_assignees(snapshot, event).await;
            }
            WorkItemEventKind::AssigneesChanged => {
                self.dm_assignees(snapshot, event).await;
                self.thread_or_post(event.thread_key(), channel.as_deref(), &text)
                    .await;
            }
            WorkItemEventKind::Completed | WorkItemEventKind::Commented => {
                self.thread_or_post(event.thread_key(), channel.as_deref(), &text)
                    .await;
            }
        }
    }

    async fn dm_assignees(&self, snapshot: Option<&DirectorySnapshot>, event: &WorkItemEvent) {
        let text = assigned_dm_text(event);
        for assignee in &event.assignees {
            match chat_id_for(snapshot, assignee) {
                Some(user) => {
                    self.dm(&user, &text).await;
                }
                None => info!(
                    assignee = %assignee.name,
                    "No chat identity for assignee, skipping DM"
                ),
            }
        }
    }

    async fn thread_or_post(&self, thread_key: &str, channel: Option<&str>, text: &str) {
        if let Some(thread) = self.threads.lookup(thread_key).await {
            self.reply(&thread, text).await;
            return;
        }
        match channel {
            Some(channel) => {
                self.post(channel, text, None).await;
            }
            None => debug!(thread_key, "No thread or channel for event, skipping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: WorkItemEventKind) -> WorkItemEvent {
        WorkItemEvent {
            kind,
            work_item_id: "t1".into(),
            parent_id: None,
            project_id: Some("p1".into()),
            project_name: Some("Web".into()),
            title: "Ship it".into(),
            url: Some("https://x/t1".into()),
            assignees: vec![PersonRef {
                id: Some("5".into()),
                name: "Ada".into(),
                email: String::new(),
            }],
            creator: Some(PersonRef {
                id: None,
                name: "Grace".into(),
                email: String::new(),
            }),
            comment: Some("<p>Looks good</p>".into()),
        }
    }

    #[test]
    fn created_text_names_everyone() {
        let text = event_text(None, &event(WorkItemEventKind::Created));
        assert!(text.contains("Grace created <https://x/t1|Ship it> in Web"));
        assert!(text.contains("Assigned to: Ada"));
    }

    #[test]
    fn comment_text_quotes_plain_body() {
        let text = event_text(None, &event(WorkItemEventKind::Commented));
        assert!(text.contains("commented on"));
        assert!(text.contains(">Looks good"));
        assert!(!text.contains("<p>"));
    }
}
