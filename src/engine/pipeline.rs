//! Work-item creation, verification and assignee notification.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::core::models::{
    BatchOutcome, CreatedWorkItem, CreationFailure, NewTodo, ResolvedTask, WorkspaceAuth,
};
use crate::errors::BotError;
use crate::gateway::WorkItemGateway;
use crate::notify::NotificationDispatcher;

/// Name of the list created when a project has none.
pub const DEFAULT_TODO_LIST_NAME: &str = "Tasks";

pub const MISSING_ASSIGNEE_WARNING: &str =
    "The task was created, but the workspace did not record the assignee. Please check it.";

pub struct CreationPipeline {
    gateway: Arc<dyn WorkItemGateway>,
    notifier: Arc<NotificationDispatcher>,
}

impl CreationPipeline {
    #[must_use]
    pub fn new(gateway: Arc<dyn WorkItemGateway>, notifier: Arc<NotificationDispatcher>) -> Self {
        Self { gateway, notifier }
    }

    /// Whether `assignee_id` is a member of the project. `None` when the
    /// membership list could not be read.
    pub async fn verify_membership(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
        assignee_id: &str,
    ) -> Option<bool> {
        match self.gateway.list_project_members(auth, project_id).await {
            Ok(members) => Some(members.iter().any(|m| m.id.trim() == assignee_id.trim())),
            Err(e) => {
                warn!(project_id, error = %e, "Membership check failed");
                None
            }
        }
    }

    /// The project's only list, its first list, or a newly created default one.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn ensure_todo_list(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<String, BotError> {
        let lists = self.gateway.list_todo_lists(auth, project_id).await?;
        if let Some(first) = lists.into_iter().next() {
            return Ok(first.id);
        }
        let created = self
            .gateway
            .create_todo_list(auth, project_id, DEFAULT_TODO_LIST_NAME)
            .await?;
        Ok(created.id)
    }

    /// Creates one work item and DMs its assignees.
    ///
    /// Membership is checked first but never blocks creation; the gateway is
    /// the authority. Notification failures are swallowed.
    ///
    /// # Errors
    ///
    /// Fails when project or list is missing, or the gateway rejects creation.
    #[instrument(skip(self, auth, task), fields(title = %task.title))]
    pub async fn create_work_item(
        &self,
        auth: &WorkspaceAuth,
        task: &ResolvedTask,
    ) -> Result<CreatedWorkItem, BotError> {
        let project_id = task
            .project_id
            .as_deref()
            .ok_or_else(|| BotError::ValidationError("task has no project".to_string()))?;
        let todo_list_id = task
            .todo_list_id
            .as_deref()
            .ok_or_else(|| BotError::ValidationError("task has no to-do list".to_string()))?;

        if let Some(assignee_id) = task.assignee_id.as_deref() {
            match self.verify_membership(auth, project_id, assignee_id).await {
                Some(true) => {}
                Some(false) => warn!(
                    project_id,
                    assignee_id, "Assignee not listed as project member, creating anyway"
                ),
                None => warn!(project_id, assignee_id, "Membership unverified, creating anyway"),
            }
        }

        let todo = NewTodo {
            title: task.title.clone(),
            description: task.description.clone(),
            assignee_ids: task.assignee_id.iter().cloned().collect(),
            due_on: task.due_on,
        };
        let work_item = self
            .gateway
            .create_todo(auth, project_id, todo_list_id, &todo)
            .await?;
        info!(work_item_id = %work_item.id, project_id, "Work item created");

        let warning = if task.assignee_id.is_some() && work_item.assignees.is_empty() {
            warn!(
                work_item_id = %work_item.id,
                "Created work item has no assignees despite a requested assignee"
            );
            Some(MISSING_ASSIGNEE_WARNING.to_string())
        } else {
            None
        };

        let hint = task
            .assignee_id
            .as_ref()
            .and(task.chat_user_id.as_deref());
        let sent = self.notifier.notify_assignees(&work_item, hint).await;
        info!(work_item_id = %work_item.id, sent, "Assignee notifications dispatched");

        Ok(CreatedWorkItem { work_item, warning })
    }

    /// Creates every task in order, one outcome per task; a failure never
    /// stops the remaining tasks.
    pub async fn create_batch(
        &self,
        auth: &WorkspaceAuth,
        tasks: &[ResolvedTask],
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (task_index, task) in tasks.iter().enumerate() {
            let result = self.create_batch_task(auth, task).await;
            if let Err(reason) = &result {
                error!(task_index, reason = %reason, "Batch task failed");
            }
            outcomes.push(BatchOutcome {
                title: task.title.clone(),
                result,
            });
        }
        outcomes
    }

    async fn create_batch_task(
        &self,
        auth: &WorkspaceAuth,
        task: &ResolvedTask,
    ) -> Result<CreatedWorkItem, CreationFailure> {
        let Some(project_id) = task.project_id.as_deref() else {
            return Err(CreationFailure::NoProject);
        };

        let mut task = task.clone();
        if task.todo_list_id.is_none() {
            let list_id = self
                .ensure_todo_list(auth, project_id)
                .await
                .map_err(|e| CreationFailure::Gateway(e.user_message().to_string()))?;
            task.todo_list_id = Some(list_id);
        }

        self.create_work_item(auth, &task)
            .await
            .map_err(|e| CreationFailure::Gateway(e.user_message().to_string()))
    }
}
