//! Multi-task requests: pre-scan, the per-task question loop, and creation.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{
    BatchProgress, ConversationEngine, MissingField, PendingInfo, Session, StepError, StepResult,
    WizardState, project_options,
};
use crate::core::models::{ResolvedTask, TodoList, WorkspaceAuth};
use crate::errors::BotError;
use crate::slack::blocks::{INVALID_DUE_DATE, PickerOption, batch_summary, due_date_prompt, picker_blocks};
use crate::utils::dates::parse_due;

/// Works out which fields a batch task is still missing.
///
/// `lists` is the project's list lookup: `None` when it could not be read.
/// A single list is filled in directly; an empty or unreadable lookup is left
/// for creation time, which falls back to the default list.
pub(crate) fn missing_fields(
    task: &mut ResolvedTask,
    lists: Option<&[TodoList]>,
) -> Vec<MissingField> {
    let mut missing = Vec::new();
    if task.project_id.is_none() {
        missing.push(MissingField::Project);
    } else if task.todo_list_id.is_none() {
        match lists {
            Some([only]) => task.todo_list_id = Some(only.id.clone()),
            Some(many) if many.len() > 1 => missing.push(MissingField::TodoList),
            _ => {}
        }
    }
    if !task.due_resolved {
        missing.push(MissingField::DueDate);
    }
    missing
}

impl ConversationEngine {
    /// Scans every extracted task, then either asks for what's missing or
    /// creates the whole batch straight away.
    pub(super) async fn start_batch(
        &self,
        session: &mut Session,
        auth: &WorkspaceAuth,
        mut tasks: Vec<ResolvedTask>,
    ) -> StepResult {
        let mut lists_by_project: HashMap<String, Option<Vec<TodoList>>> = HashMap::new();
        let mut needing_info = Vec::new();

        for (task_index, task) in tasks.iter_mut().enumerate() {
            let lists = match task.project_id.clone() {
                Some(project_id) if task.todo_list_id.is_none() => {
                    if !lists_by_project.contains_key(&project_id) {
                        let fetched = match self.gateway.list_todo_lists(auth, &project_id).await {
                            Ok(lists) => Some(lists),
                            Err(e) => {
                                warn!(project_id = %project_id, error = %e, "List lookup failed during batch scan");
                                None
                            }
                        };
                        lists_by_project.insert(project_id.clone(), fetched);
                    }
                    lists_by_project.get(&project_id).and_then(Option::as_deref)
                }
                _ => None,
            };

            let missing = missing_fields(task, lists);
            if !missing.is_empty() {
                debug!(task_index, ?missing, "Batch task needs info");
                needing_info.push(PendingInfo {
                    task_index,
                    missing,
                });
            }
        }

        info!(
            tasks = tasks.len(),
            needing_info = needing_info.len(),
            "Batch request scanned"
        );
        self.say(
            &session.channel_id,
            &format!("I found {} tasks in your message.", tasks.len()),
        )
        .await;

        let pending = !needing_info.is_empty();
        session.batch = Some(BatchProgress {
            tasks,
            needing_info,
            current: 0,
        });
        if pending {
            self.advance_batch(session, auth).await
        } else {
            self.finish_batch(session, auth).await
        }
    }

    /// Asks the next outstanding question, or creates everything once no
    /// entry has anything left to ask.
    async fn advance_batch(&self, session: &mut Session, auth: &WorkspaceAuth) -> StepResult {
        loop {
            let Some(batch) = session.batch.as_mut() else {
                return Err(BotError::GeneralError("batch progress missing".to_string()).into());
            };
            let Some(entry) = batch.current_entry() else {
                return self.finish_batch(session, auth).await;
            };
            let task_index = entry.task_index;
            let Some(next) = entry.missing.first().copied() else {
                batch.current += 1;
                continue;
            };

            match next {
                MissingField::Project => {
                    session.state = WizardState::BatchSelectingProject {
                        task_index,
                        page: 0,
                    };
                    return self.show_batch_project_picker(session, auth).await;
                }
                MissingField::TodoList => {
                    session.state = WizardState::BatchSelectingTodoList {
                        task_index,
                        page: 0,
                    };
                    return self.show_batch_list_picker(session, auth).await;
                }
                MissingField::DueDate => {
                    session.state = WizardState::BatchAwaitingDueDate { task_index };
                    let title = batch_title(session, task_index);
                    let text = format!(
                        "{} _(task {} of {})_",
                        due_date_prompt(&title, self.clock.today()),
                        task_index + 1,
                        batch_len(session)
                    );
                    self.prompt(session, &text, None).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Marks `field` answered for the current entry.
    fn satisfy(session: &mut Session, field: MissingField) {
        if let Some(entry) = session
            .batch
            .as_mut()
            .and_then(|b| b.needing_info.get_mut(b.current))
        {
            entry.missing.retain(|m| *m != field);
        }
    }

    fn batch_task_mut(session: &mut Session, task_index: usize) -> Result<&mut ResolvedTask, BotError> {
        session
            .batch
            .as_mut()
            .and_then(|b| b.tasks.get_mut(task_index))
            .ok_or_else(|| BotError::GeneralError(format!("batch task {task_index} missing")))
    }

    pub(super) async fn show_batch_project_picker(
        &self,
        session: &mut Session,
        auth: &WorkspaceAuth,
    ) -> StepResult {
        let WizardState::BatchSelectingProject { task_index, page } = session.state else {
            return Ok(());
        };
        let projects = self
            .gateway
            .list_projects(auth)
            .await
            .map_err(StepError::Retry)?;
        let text = format!(
            "Task {} of {}: which project should *{}* go in?",
            task_index + 1,
            batch_len(session),
            batch_title(session, task_index)
        );
        let blocks = picker_blocks(
            &text,
            &project_options(&projects),
            page,
            "batch_project",
            &[],
            None,
        );
        self.prompt(session, &text, Some(&blocks)).await?;
        Ok(())
    }

    pub(super) async fn on_batch_project_picked(
        &self,
        session: &mut Session,
        task_index: usize,
        project_id: &str,
    ) -> StepResult {
        let auth = self.auth_for(&session.user_id).await?;
        let project = self
            .gateway
            .get_project(&auth, project_id)
            .await
            .map_err(StepError::Retry)?;
        let lists = match self.gateway.list_todo_lists(&auth, &project.id).await {
            Ok(lists) => Some(lists),
            Err(e) => {
                warn!(project_id = %project.id, error = %e, "List lookup failed for batch task");
                None
            }
        };
        info!(task_index, project_id = %project.id, "Batch project picked");

        let needs_list = {
            let task = Self::batch_task_mut(session, task_index)?;
            task.project_id = Some(project.id);
            task.project_name = Some(project.name);
            task.todo_list_id = None;
            match lists.as_deref() {
                Some([only]) => {
                    task.todo_list_id = Some(only.id.clone());
                    false
                }
                Some(many) => many.len() > 1,
                None => false,
            }
        };

        Self::satisfy(session, MissingField::Project);
        if needs_list
            && let Some(entry) = session
                .batch
                .as_mut()
                .and_then(|b| b.needing_info.get_mut(b.current))
        {
            entry.require(MissingField::TodoList);
        }
        self.advance_batch(session, &auth).await
    }

    pub(super) async fn show_batch_list_picker(
        &self,
        session: &mut Session,
        auth: &WorkspaceAuth,
    ) -> StepResult {
        let WizardState::BatchSelectingTodoList { task_index, page } = session.state else {
            return Ok(());
        };
        let (project_id, project_name) = {
            let task = Self::batch_task_mut(session, task_index)?;
            (task.project_id.clone(), task.project_name.clone())
        };
        let Some(project_id) = project_id else {
            return Err(BotError::ValidationError("batch task has no project".to_string()).into());
        };
        let lists = self
            .gateway
            .list_todo_lists(auth, &project_id)
            .await
            .map_err(StepError::Retry)?;
        let options: Vec<PickerOption> = lists
            .iter()
            .map(|l| PickerOption::new(l.id.clone(), l.name.clone()))
            .collect();
        let text = format!(
            "Task {} of {}: which list in *{}* should *{}* go on?",
            task_index + 1,
            batch_len(session),
            project_name.as_deref().unwrap_or("the project"),
            batch_title(session, task_index)
        );
        let blocks = picker_blocks(&text, &options, page, "batch_todolist", &[], None);
        self.prompt(session, &text, Some(&blocks)).await?;
        Ok(())
    }

    pub(super) async fn on_batch_list_picked(
        &self,
        session: &mut Session,
        task_index: usize,
        todo_list_id: String,
    ) -> StepResult {
        let auth = self.auth_for(&session.user_id).await?;
        Self::batch_task_mut(session, task_index)?.todo_list_id = Some(todo_list_id);
        Self::satisfy(session, MissingField::TodoList);
        self.advance_batch(session, &auth).await
    }

    pub(super) async fn on_batch_due_text(
        &self,
        session: &mut Session,
        task_index: usize,
        text: &str,
    ) -> StepResult {
        let Some(due_on) = parse_due(text, self.clock.today()).settled() else {
            self.say(&session.channel_id, INVALID_DUE_DATE).await;
            return Ok(());
        };
        {
            let task = Self::batch_task_mut(session, task_index)?;
            task.due_on = due_on;
            task.due_resolved = true;
        }
        Self::satisfy(session, MissingField::DueDate);

        let auth = self.auth_for(&session.user_id).await?;
        self.advance_batch(session, &auth).await
    }

    /// Creates every batch task in order and posts one summary.
    async fn finish_batch(&self, session: &mut Session, auth: &WorkspaceAuth) -> StepResult {
        let tasks = session
            .batch
            .as_ref()
            .map(|b| b.tasks.clone())
            .unwrap_or_default();
        let outcomes = self.pipeline.create_batch(auth, &tasks).await;
        let created = outcomes.iter().filter(|o| o.is_success()).count();
        info!(created, total = outcomes.len(), "Batch finished");

        let (text, blocks) = batch_summary(&outcomes);
        self.say_with_blocks(&session.channel_id, &text, &blocks)
            .await;
        session.reset();
        Ok(())
    }
}

fn batch_title(session: &Session, task_index: usize) -> String {
    session
        .batch
        .as_ref()
        .and_then(|b| b.tasks.get(task_index))
        .map(|t| t.title.clone())
        .unwrap_or_default()
}

fn batch_len(session: &Session) -> usize {
    session.batch.as_ref().map_or(0, |b| b.tasks.len())
}
