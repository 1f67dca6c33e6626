//! Turns extracted names into work-management identifiers.
//!
//! A name that cannot be matched is not an error: the field is left absent and
//! the conversation engine asks for it interactively.

pub mod matching;

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::core::models::{IntentItem, Member, Project, ResolvedTask, WorkspaceAuth};
use crate::directory::DirectorySnapshot;
use crate::gateway::WorkItemGateway;
use crate::utils::dates::{DueDate, parse_due};

pub use matching::{match_person, match_project};

/// Workspace members, fetched at most once per resolution batch.
#[derive(Debug, Default)]
pub struct MemberCache {
    members: Option<Vec<Member>>,
    fetches: usize,
}

impl MemberCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the member list was requested upstream.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    /// A failed fetch is remembered as an empty list.
    pub async fn members(
        &mut self,
        gateway: &dyn WorkItemGateway,
        auth: &WorkspaceAuth,
    ) -> &[Member] {
        if self.members.is_none() {
            self.fetches += 1;
            let fetched = match gateway.list_workspace_members(auth).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(error = %e, "Workspace member lookup failed, treating as no match");
                    Vec::new()
                }
            };
            self.members = Some(fetched);
        }
        self.members.as_deref().unwrap_or_default()
    }
}

/// Everything resolution reads, gathered once per inbound message.
pub struct ResolutionContext<'a> {
    pub projects: &'a [Project],
    pub directory: &'a DirectorySnapshot,
    pub auth: &'a WorkspaceAuth,
    pub today: NaiveDate,
}

pub struct EntityResolver {
    gateway: Arc<dyn WorkItemGateway>,
}

impl EntityResolver {
    #[must_use]
    pub fn new(gateway: Arc<dyn WorkItemGateway>) -> Self {
        Self { gateway }
    }

    /// Resolves every item with one shared member cache.
    pub async fn resolve_all(
        &self,
        items: &[IntentItem],
        ctx: &ResolutionContext<'_>,
    ) -> Vec<ResolvedTask> {
        let mut members = MemberCache::new();
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            resolved.push(self.resolve(item, ctx, &mut members).await);
        }
        resolved
    }

    pub async fn resolve(
        &self,
        item: &IntentItem,
        ctx: &ResolutionContext<'_>,
        members: &mut MemberCache,
    ) -> ResolvedTask {
        let mut task = ResolvedTask {
            title: item.title.clone(),
            description: item.description.clone(),
            ..ResolvedTask::default()
        };

        if let Some(name) = item.project_name.as_deref()
            && let Some(project) = match_project(name, ctx.projects)
        {
            task.project_id = Some(project.id.clone());
            task.project_name = Some(project.name.clone());
        }

        if let Some(name) = item.first_assignee()
            && let Some(person) = match_person(name, &ctx.directory.people)
        {
            task.assignee_name = Some(person.name.clone());
            task.chat_user_id.clone_from(&person.chat_user_id);
            if !person.email.is_empty() {
                task.assignee_email = Some(person.email.clone());
            }
            task.assignee_id = match &person.external_id {
                Some(id) => Some(id.clone()),
                None if !person.email.is_empty() => members
                    .members(self.gateway.as_ref(), ctx.auth)
                    .await
                    .iter()
                    .find(|m| m.email.trim().eq_ignore_ascii_case(person.email.trim()))
                    .map(|m| m.id.clone()),
                None => None,
            };
        }

        if let Some(expr) = item.due_date.as_deref() {
            match parse_due(expr, ctx.today) {
                DueDate::Skipped => task.due_resolved = true,
                DueDate::Parsed(date) => {
                    task.due_on = Some(date);
                    task.due_resolved = true;
                }
                DueDate::Invalid => debug!(expr, "Extracted due date not understood"),
            }
        }

        debug!(
            project = task.project_id.is_some(),
            assignee = task.assignee_id.is_some(),
            due = task.due_resolved,
            "Resolved task"
        );
        task
    }
}
