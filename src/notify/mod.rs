//! Outbound notifications.
//!
//! Sends here are best effort: a failed post or DM is logged and swallowed so
//! it can never make a created work item look uncreated.

pub mod fanout;
pub mod threads;

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::core::models::{MessageRef, WorkItem};
use crate::directory::{DirectoryCache, DirectorySnapshot};
use crate::slack::ChatTransport;
use crate::utils::text::{html_to_plain, truncate_with_ellipsis};

pub use threads::ThreadStore;

/// Longest description excerpt included in an assignment DM.
const DM_DESCRIPTION_CHARS: usize = 300;

pub struct NotificationDispatcher {
    chat: Arc<dyn ChatTransport>,
    directory: Arc<DirectoryCache>,
    threads: ThreadStore,
    default_channel: Option<String>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        directory: Arc<DirectoryCache>,
        default_channel: Option<String>,
    ) -> Self {
        Self {
            chat,
            directory,
            threads: ThreadStore::default(),
            default_channel,
        }
    }

    #[must_use]
    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    pub async fn post(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<&Value>,
    ) -> Option<MessageRef> {
        match self.chat.post_message(channel, text, blocks, None).await {
            Ok(posted) => Some(posted),
            Err(e) => {
                warn!(channel, error = %e, "Channel notification failed");
                None
            }
        }
    }

    pub async fn reply(&self, thread: &MessageRef, text: &str) -> Option<MessageRef> {
        match self
            .chat
            .post_message(&thread.channel, text, None, Some(&thread.ts))
            .await
        {
            Ok(posted) => Some(posted),
            Err(e) => {
                warn!(thread = %thread, error = %e, "Thread reply failed");
                None
            }
        }
    }

    pub async fn dm(&self, chat_user_id: &str, text: &str) -> Option<MessageRef> {
        match self.chat.send_dm(chat_user_id, text).await {
            Ok(posted) => Some(posted),
            Err(e) => {
                warn!(user_id = chat_user_id, error = %e, "Direct message failed");
                None
            }
        }
    }

    async fn directory_snapshot(&self) -> Option<Arc<DirectorySnapshot>> {
        match self.directory.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Directory unavailable for notification lookup");
                None
            }
        }
    }

    /// DMs every assignee of a newly created work item.
    ///
    /// `chat_user_hint` is the chat identity already resolved upstream; when
    /// present it is used directly instead of looking assignees up again.
    /// An item that came back without assignees gets no DM at all.
    /// Returns how many DMs were delivered.
    pub async fn notify_assignees(&self, item: &WorkItem, chat_user_hint: Option<&str>) -> usize {
        if item.assignees.is_empty() {
            return 0;
        }
        let text = assignment_text(item);

        if let Some(user) = chat_user_hint {
            return usize::from(self.dm(user, &text).await.is_some());
        }

        let Some(snapshot) = self.directory_snapshot().await else {
            return 0;
        };
        let mut sent = 0;
        for assignee in &item.assignees {
            let chat_id = snapshot
                .person_by_external_id(&assignee.id)
                .or_else(|| snapshot.person_by_email(&assignee.email))
                .and_then(|p| p.chat_user_id.clone());
            match chat_id {
                Some(user) => {
                    if self.dm(&user, &text).await.is_some() {
                        sent += 1;
                    }
                }
                None => info!(
                    assignee_id = %assignee.id,
                    "No chat identity for assignee, skipping DM"
                ),
            }
        }
        sent
    }

    /// Project channel from the mapping, else the configured default.
    fn channel_for(
        &self,
        snapshot: Option<&DirectorySnapshot>,
        project_id: Option<&str>,
    ) -> Option<String> {
        project_id
            .and_then(|id| snapshot.and_then(|s| s.channel_for_project(id)))
            .map(ToString::to_string)
            .or_else(|| self.default_channel.clone())
    }
}

/// DM text telling someone a work item is theirs.
#[must_use]
pub fn assignment_text(item: &WorkItem) -> String {
    let mut text = format!(":clipboard: You've been assigned *{}*", item.title);
    if let Some(due) = item.due_on {
        text.push_str(&format!(" (due {})", due.format("%a %b %-d")));
    }
    let description = html_to_plain(&item.description);
    let description = description.trim();
    if !description.is_empty() {
        text.push('\n');
        text.push_str(&truncate_with_ellipsis(description, DM_DESCRIPTION_CHARS));
    }
    if !item.url.is_empty() {
        text.push_str(&format!("\n<{}|Open in workspace>", item.url));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn assignment_text_renders_html_and_link() {
        let item = WorkItem {
            id: "1".into(),
            title: "Ship it".into(),
            description: "<div><strong>Now</strong> please</div>".into(),
            assignees: vec![],
            due_on: NaiveDate::from_ymd_opt(2025, 3, 7),
            url: "https://x/1".into(),
        };
        let text = assignment_text(&item);
        assert!(text.contains("*Ship it* (due Fri Mar 7)"));
        assert!(text.contains("please"));
        assert!(!text.contains("<div>"));
        assert!(text.ends_with("<https://x/1|Open in workspace>"));
    }
}
