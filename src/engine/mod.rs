//! The per-user conversation state machine.
//!
//! Every inbound message, button press and slash command for a user goes
//! through [`ConversationEngine`]. A handler loads the user's [`Session`], runs
//! exactly one transition against it and saves it back. Errors that escape a
//! transition reset the session so nobody is left stuck mid-wizard.

pub mod actions;
pub mod batch;
pub mod pipeline;
pub mod session;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::ai::IntentExtractor;
use crate::core::models::{
    Availability, DirectoryContext, Member, NamedRef, Project, WorkspaceAuth,
};
use crate::core::user_tokens::{CredentialStore, require_auth};
use crate::directory::{DirectoryCache, DirectorySnapshot, RefreshOutcome};
use crate::errors::BotError;
use crate::gateway::WorkItemGateway;
use crate::notify::NotificationDispatcher;
use crate::resolve::{EntityResolver, ResolutionContext};
use crate::slack::ChatTransport;
use crate::slack::blocks::{
    INVALID_DUE_DATE, PickerOption, confirmation_blocks, created_text, due_date_prompt,
    picker_blocks,
};
use crate::slack::response_builder::HELP_TEXT;
use crate::utils::clock::Clock;
use crate::utils::dates::parse_due;

pub use actions::WizardAction;
pub use pipeline::{CreationPipeline, DEFAULT_TODO_LIST_NAME};
pub use session::{
    BatchProgress, InMemorySessionStore, MissingField, PendingInfo, Selections, Session,
    SessionStore, WizardState,
};

pub const CANCELLED_TEXT: &str = "Cancelled. Send me a new message whenever you're ready.";
pub const NOTHING_TO_CANCEL_TEXT: &str = "There's nothing to cancel.";
pub const STALE_ACTION_TEXT: &str =
    "That button isn't active anymore. Send me a new message to start a task.";
pub const STILL_WORKING_TEXT: &str = "I'm still working on your last message, one moment.";
pub const USE_BUTTONS_TEXT: &str =
    "Please pick one of the options above, or type `cancel` to start over.";
pub const RETRY_READ_TEXT: &str =
    "I couldn't load that from the project workspace just now. Please try the same option again.";
pub const SHOWING_ALL_MEMBERS_WARNING: &str =
    "Couldn't load this project's members, showing everyone in the workspace.";

/// How a failed transition is surfaced.
#[derive(Debug)]
enum StepError {
    /// Read failure while prompting: keep what was collected, ask to retry.
    Retry(BotError),
    /// Anything else: reset the session.
    Reset(BotError),
}

impl From<BotError> for StepError {
    fn from(error: BotError) -> Self {
        StepError::Reset(error)
    }
}

type StepResult = Result<(), StepError>;

/// Collaborators the engine is built from.
pub struct EngineParts {
    pub extractor: IntentExtractor,
    pub gateway: Arc<dyn WorkItemGateway>,
    pub directory: Arc<DirectoryCache>,
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub chat: Arc<dyn ChatTransport>,
    pub notifier: Arc<NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
}

pub struct ConversationEngine {
    extractor: IntentExtractor,
    resolver: EntityResolver,
    gateway: Arc<dyn WorkItemGateway>,
    directory: Arc<DirectoryCache>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    chat: Arc<dyn ChatTransport>,
    pipeline: CreationPipeline,
    clock: Arc<dyn Clock>,
}

impl ConversationEngine {
    #[must_use]
    pub fn new(parts: EngineParts) -> Self {
        Self {
            extractor: parts.extractor,
            resolver: EntityResolver::new(Arc::clone(&parts.gateway)),
            pipeline: CreationPipeline::new(Arc::clone(&parts.gateway), parts.notifier),
            gateway: parts.gateway,
            directory: parts.directory,
            credentials: parts.credentials,
            sessions: parts.sessions,
            chat: parts.chat,
            clock: parts.clock,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// A plain text message from a user.
    ///
    /// # Errors
    ///
    /// Only session-store level failures escape; transition errors are
    /// reported to the user and reset the session.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub async fn handle_message(
        &self,
        user_id: &str,
        channel_id: &str,
        text: &str,
    ) -> Result<(), BotError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if text.eq_ignore_ascii_case("cancel") {
            return self.cancel(user_id, channel_id).await;
        }

        let mut session = self.load_session(user_id, channel_id).await;
        if session.state.is_idle() && !self.directory.is_authorized(user_id).await {
            info!("Ignoring request from unauthorized user");
            self.say(
                channel_id,
                BotError::NotAuthorized(user_id.to_string()).user_message(),
            )
            .await;
            return Ok(());
        }

        let generation = session.generation;
        let result = match session.state {
            WizardState::Idle => self.start_request(&mut session, text).await,
            WizardState::AwaitingDueDate => self.on_due_text(&mut session, text).await,
            WizardState::BatchAwaitingDueDate { task_index } => {
                self.on_batch_due_text(&mut session, task_index, text).await
            }
            WizardState::AwaitingIntent => {
                self.say(channel_id, STILL_WORKING_TEXT).await;
                Ok(())
            }
            _ => {
                self.say(channel_id, USE_BUTTONS_TEXT).await;
                Ok(())
            }
        };
        self.finish(session, generation, result).await;
        Ok(())
    }

    /// A button press; `action_id` carries the callback data.
    ///
    /// # Errors
    ///
    /// Only session-store level failures escape.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn handle_action(
        &self,
        user_id: &str,
        channel_id: &str,
        action_id: &str,
    ) -> Result<(), BotError> {
        let Some(action) = WizardAction::parse(action_id) else {
            debug!(action_id, "Ignoring unknown action");
            return Ok(());
        };
        if action == WizardAction::Cancel {
            return self.cancel(user_id, channel_id).await;
        }

        let mut session = self.load_session(user_id, channel_id).await;
        let generation = session.generation;
        let result = self.on_action(&mut session, action).await;
        self.finish(session, generation, result).await;
        Ok(())
    }

    /// A slash command (`/cancel`, `/help`, `/refresh`, `/status`).
    ///
    /// # Errors
    ///
    /// Only session-store level failures escape.
    #[instrument(skip(self, text), fields(user_id = %user_id))]
    pub async fn handle_command(
        &self,
        user_id: &str,
        channel_id: &str,
        command: &str,
        text: &str,
    ) -> Result<(), BotError> {
        match command.trim().trim_start_matches('/') {
            "cancel" => self.cancel(user_id, channel_id).await,
            "refresh" => {
                let reply = match self.directory.force_refresh().await {
                    Ok(RefreshOutcome::Refreshed { people, channels }) => format!(
                        "Directory refreshed: {people} people, {channels} project channels."
                    ),
                    Ok(RefreshOutcome::ServingStale) => {
                        "The directory didn't respond, I'm still using the last copy I had."
                            .to_string()
                    }
                    Err(e) => {
                        warn!(error = %e, "Directory refresh failed");
                        e.user_message().to_string()
                    }
                };
                self.tell_user(user_id, &reply).await;
                Ok(())
            }
            "status" => {
                self.set_status(user_id, text).await;
                Ok(())
            }
            _ => {
                self.tell_user(user_id, HELP_TEXT).await;
                Ok(())
            }
        }
    }

    /// Cancels whatever the user is doing, deleting the wizard's prompts.
    ///
    /// # Errors
    ///
    /// Only session-store level failures escape.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn cancel(&self, user_id: &str, channel_id: &str) -> Result<(), BotError> {
        let mut session = self.load_session(user_id, channel_id).await;
        if session.state.is_idle() {
            self.say(channel_id, NOTHING_TO_CANCEL_TEXT).await;
            return Ok(());
        }

        info!(step = session.state.step(), state = %session.state, "Cancelling wizard");
        let tracked = session.reset();
        self.sessions.save(session).await;
        self.delete_messages(&tracked).await;
        self.say(channel_id, CANCELLED_TEXT).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session plumbing
    // ------------------------------------------------------------------

    async fn load_session(&self, user_id: &str, channel_id: &str) -> Session {
        let mut session = self
            .sessions
            .load(user_id)
            .await
            .unwrap_or_else(|| Session::new(user_id, channel_id));
        session.channel_id = channel_id.to_string();
        session
    }

    /// True when the stored session was reset after `generation` was loaded.
    async fn superseded(&self, user_id: &str, generation: u64) -> bool {
        self.sessions
            .load(user_id)
            .await
            .is_some_and(|current| current.generation != generation)
    }

    async fn finish(&self, mut session: Session, loaded_generation: u64, result: StepResult) {
        if self.superseded(&session.user_id, loaded_generation).await {
            info!(
                user_id = %session.user_id,
                "Session was reset while this step ran, discarding its result"
            );
            return;
        }

        match result {
            Ok(()) => {}
            Err(StepError::Retry(e)) => {
                warn!(
                    user_id = %session.user_id,
                    step = session.state.step(),
                    error = %e,
                    "Read failed during prompt, keeping selections"
                );
                self.say(&session.channel_id, RETRY_READ_TEXT).await;
            }
            Err(StepError::Reset(e)) => {
                error!(
                    user_id = %session.user_id,
                    step = session.state.step(),
                    error = %e,
                    "Transition failed, resetting session"
                );
                let tracked = session.reset();
                self.delete_messages(&tracked).await;
                self.say(&session.channel_id, e.user_message()).await;
            }
        }
        debug!(user_id = %session.user_id, step = session.state.step(), "Saving session");
        self.sessions.save(session).await;
    }

    async fn auth_for(&self, user_id: &str) -> Result<WorkspaceAuth, BotError> {
        require_auth(self.credentials.as_ref(), user_id).await
    }

    /// Live projects plus the directory snapshot, read concurrently.
    async fn lookup_context(
        &self,
        auth: &WorkspaceAuth,
    ) -> Result<(Vec<Project>, Arc<DirectorySnapshot>), BotError> {
        tokio::try_join!(self.gateway.list_projects(auth), self.directory.snapshot())
    }

    // ------------------------------------------------------------------
    // Chat helpers
    // ------------------------------------------------------------------

    /// Posts an interactive prompt and tracks it for cleanup.
    async fn prompt(
        &self,
        session: &mut Session,
        text: &str,
        blocks: Option<&Value>,
    ) -> Result<(), BotError> {
        let posted = self
            .chat
            .post_message(&session.channel_id, text, blocks, None)
            .await?;
        session.ui_messages.push(posted);
        Ok(())
    }

    /// Best-effort informational post.
    async fn say(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.chat.post_message(channel_id, text, None, None).await {
            warn!(channel_id, error = %e, "Failed to post message");
        }
    }

    async fn say_with_blocks(&self, channel_id: &str, text: &str, blocks: &Value) {
        if let Err(e) = self
            .chat
            .post_message(channel_id, text, Some(blocks), None)
            .await
        {
            warn!(channel_id, error = %e, "Failed to post message");
        }
    }

    async fn tell_user(&self, user_id: &str, text: &str) {
        if let Err(e) = self.chat.send_dm(user_id, text).await {
            warn!(user_id, error = %e, "Failed to DM user");
        }
    }

    async fn delete_messages(&self, messages: &[crate::core::models::MessageRef]) {
        for message in messages {
            if let Err(e) = self.chat.delete_message(message).await {
                warn!(message = %message, error = %e, "Failed to delete prompt");
            }
        }
    }

    // ------------------------------------------------------------------
    // Single-task transitions
    // ------------------------------------------------------------------

    async fn start_request(&self, session: &mut Session, text: &str) -> StepResult {
        session.state = WizardState::AwaitingIntent;
        session.selections.original_message = Some(text.to_string());
        self.sessions.save(session.clone()).await;
        info!(user_id = %session.user_id, step = session.state.step(), "New task request");

        let auth = self.auth_for(&session.user_id).await?;
        let (projects, snapshot) = self.lookup_context(&auth).await?;
        let context = directory_context(&projects, &snapshot);
        let today = self.clock.today();

        let intent = self.extractor.extract(text, &context, today).await;
        if self.superseded(&session.user_id, session.generation).await {
            return Ok(());
        }

        let items = intent.into_items();
        let resolution = ResolutionContext {
            projects: &projects,
            directory: &snapshot,
            auth: &auth,
            today,
        };
        let mut tasks = self.resolver.resolve_all(&items, &resolution).await;

        if tasks.len() > 1 {
            return self.start_batch(session, &auth, tasks).await;
        }
        let task = tasks
            .pop()
            .ok_or_else(|| BotError::GeneralError("extraction produced no task".to_string()))?;
        session.selections.task = task;
        session.state = WizardState::Confirming;
        self.show_confirmation(session).await?;
        Ok(())
    }

    async fn show_confirmation(&self, session: &mut Session) -> Result<(), BotError> {
        let task = &session.selections.task;
        let text = format!("Here's the task I'll create: *{}*", task.title);
        let blocks = confirmation_blocks(task);
        self.prompt(session, &text, Some(&blocks)).await
    }

    async fn on_action(&self, session: &mut Session, action: WizardAction) -> StepResult {
        use WizardAction as A;
        use WizardState as S;

        match (session.state, action) {
            (S::Confirming, A::Confirm) => self.route_after_confirm(session).await,
            (S::Confirming, A::Rewrite) => self.rewrite(session).await,

            (S::SelectingProject { .. }, A::ProjectPage(page)) => {
                session.state = S::SelectingProject { page };
                let auth = self.auth_for(&session.user_id).await?;
                self.show_project_picker(session, &auth).await
            }
            (S::SelectingProject { .. }, A::Project(id)) => {
                self.on_project_picked(session, &id).await
            }

            (S::SelectingTodoList { .. }, A::TodoListPage(page)) => {
                session.state = S::SelectingTodoList { page };
                let auth = self.auth_for(&session.user_id).await?;
                self.show_list_picker(session, &auth).await
            }
            (S::SelectingTodoList { .. }, A::TodoList(id)) => {
                session.selections.task.todo_list_id = Some(id);
                let auth = self.auth_for(&session.user_id).await?;
                self.continue_after_list(session, &auth).await
            }

            (S::SelectingAssignee { showing_all, .. }, A::PersonPage(page)) => {
                session.state = S::SelectingAssignee { page, showing_all };
                let auth = self.auth_for(&session.user_id).await?;
                self.show_assignee_picker(session, &auth).await
            }
            (S::SelectingAssignee { showing_all, .. }, A::Person(id)) => {
                self.on_person_picked(session, Some(&id), showing_all).await
            }
            (S::SelectingAssignee { showing_all, .. }, A::NoPerson) => {
                self.on_person_picked(session, None, showing_all).await
            }

            (S::BatchSelectingProject { task_index, .. }, A::BatchProjectPage(page)) => {
                session.state = S::BatchSelectingProject { task_index, page };
                let auth = self.auth_for(&session.user_id).await?;
                self.show_batch_project_picker(session, &auth).await
            }
            (S::BatchSelectingProject { task_index, .. }, A::BatchProject(id)) => {
                self.on_batch_project_picked(session, task_index, &id).await
            }
            (S::BatchSelectingTodoList { task_index, .. }, A::BatchTodoListPage(page)) => {
                session.state = S::BatchSelectingTodoList { task_index, page };
                let auth = self.auth_for(&session.user_id).await?;
                self.show_batch_list_picker(session, &auth).await
            }
            (S::BatchSelectingTodoList { task_index, .. }, A::BatchTodoList(id)) => {
                self.on_batch_list_picked(session, task_index, id).await
            }

            (state, action) => {
                debug!(state = %state, ?action, "Action does not apply to current state");
                self.say(&session.channel_id, STALE_ACTION_TEXT).await;
                Ok(())
            }
        }
    }

    async fn rewrite(&self, session: &mut Session) -> StepResult {
        let original = session
            .selections
            .original_message
            .clone()
            .unwrap_or_else(|| session.selections.task.description.clone());
        let auth = self.auth_for(&session.user_id).await?;
        let (projects, snapshot) = self
            .lookup_context(&auth)
            .await
            .map_err(StepError::Retry)?;
        let context = directory_context(&projects, &snapshot);

        let item = self
            .extractor
            .rewrite(&original, &context, self.clock.today())
            .await;
        session.selections.task.title = item.title;
        session.selections.task.description = item.description;
        self.show_confirmation(session).await?;
        Ok(())
    }

    async fn route_after_confirm(&self, session: &mut Session) -> StepResult {
        let auth = self.auth_for(&session.user_id).await?;
        if session.selections.task.project_id.is_none() {
            session.state = WizardState::SelectingProject { page: 0 };
            return self.show_project_picker(session, &auth).await;
        }
        if session.selections.task.todo_list_id.is_some() {
            return self.continue_after_list(session, &auth).await;
        }
        self.select_list(session, &auth).await
    }

    async fn show_project_picker(&self, session: &mut Session, auth: &WorkspaceAuth) -> StepResult {
        let WizardState::SelectingProject { page } = session.state else {
            return Ok(());
        };
        let projects = self
            .gateway
            .list_projects(auth)
            .await
            .map_err(StepError::Retry)?;
        let options = project_options(&projects);
        let text = format!(
            "Which project should *{}* go in?",
            session.selections.task.title
        );
        let blocks = picker_blocks(&text, &options, page, "project", &[], None);
        self.prompt(session, &text, Some(&blocks)).await?;
        Ok(())
    }

    async fn on_project_picked(&self, session: &mut Session, project_id: &str) -> StepResult {
        let auth = self.auth_for(&session.user_id).await?;
        let project = self
            .gateway
            .get_project(&auth, project_id)
            .await
            .map_err(StepError::Retry)?;
        info!(project_id = %project.id, "Project picked");
        let task = &mut session.selections.task;
        task.project_id = Some(project.id);
        task.project_name = Some(project.name);
        task.todo_list_id = None;
        self.select_list(session, &auth).await
    }

    /// One list is used directly, none gets a default list, several are asked.
    async fn select_list(&self, session: &mut Session, auth: &WorkspaceAuth) -> StepResult {
        let Some(project_id) = session.selections.task.project_id.clone() else {
            return Err(BotError::ValidationError("no project selected".to_string()).into());
        };
        let mut lists = self
            .gateway
            .list_todo_lists(auth, &project_id)
            .await
            .map_err(StepError::Retry)?;

        match lists.len() {
            0 => {
                let created = self
                    .gateway
                    .create_todo_list(auth, &project_id, DEFAULT_TODO_LIST_NAME)
                    .await?;
                session.selections.task.todo_list_id = Some(created.id);
                self.continue_after_list(session, auth).await
            }
            1 => {
                session.selections.task.todo_list_id = lists.pop().map(|l| l.id);
                self.continue_after_list(session, auth).await
            }
            _ => {
                session.state = WizardState::SelectingTodoList { page: 0 };
                self.show_list_picker(session, auth).await
            }
        }
    }

    async fn show_list_picker(&self, session: &mut Session, auth: &WorkspaceAuth) -> StepResult {
        let WizardState::SelectingTodoList { page } = session.state else {
            return Ok(());
        };
        let Some(project_id) = session.selections.task.project_id.clone() else {
            return Err(BotError::ValidationError("no project selected".to_string()).into());
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
            "Which list in *{}* should it go on?",
            session
                .selections
                .task
                .project_name
                .as_deref()
                .unwrap_or("the project")
        );
        let blocks = picker_blocks(&text, &options, page, "todolist", &[], None);
        self.prompt(session, &text, Some(&blocks)).await?;
        Ok(())
    }

    /// After the list is known: create straight away when the assignee and
    /// due date were both resolved from the message, otherwise ask.
    async fn continue_after_list(
        &self,
        session: &mut Session,
        auth: &WorkspaceAuth,
    ) -> StepResult {
        let task = &session.selections.task;
        if task.assignee_id.is_some() && task.due_resolved {
            return self.create_single(session, auth).await;
        }
        if task.assignee_id.is_none() {
            session.state = WizardState::SelectingAssignee {
                page: 0,
                showing_all: false,
            };
            return self.show_assignee_picker(session, auth).await;
        }
        session.state = WizardState::AwaitingDueDate;
        self.ask_due_date(session).await?;
        Ok(())
    }

    /// Project members, falling back to the whole workspace (flagged).
    async fn assignee_candidates(
        &self,
        auth: &WorkspaceAuth,
        project_id: Option<&str>,
        force_all: bool,
    ) -> Result<(Vec<Member>, bool), BotError> {
        if !force_all && let Some(project_id) = project_id {
            match self.gateway.list_project_members(auth, project_id).await {
                Ok(members) if !members.is_empty() => return Ok((members, false)),
                Ok(_) => debug!(project_id, "Project lists no members, showing workspace"),
                Err(e) => warn!(
                    project_id,
                    error = %e,
                    "Project member lookup failed, falling back to workspace members"
                ),
            }
        }
        let members = self.gateway.list_workspace_members(auth).await?;
        Ok((members, true))
    }

    async fn show_assignee_picker(
        &self,
        session: &mut Session,
        auth: &WorkspaceAuth,
    ) -> StepResult {
        let WizardState::SelectingAssignee { page, showing_all } = session.state else {
            return Ok(());
        };
        let (members, showing_all) = self
            .assignee_candidates(
                auth,
                session.selections.task.project_id.as_deref(),
                showing_all,
            )
            .await
            .map_err(StepError::Retry)?;
        session.state = WizardState::SelectingAssignee { page, showing_all };

        let snapshot = self.directory.snapshot().await.ok();
        let options: Vec<PickerOption> = members
            .iter()
            .map(|m| {
                let availability = snapshot
                    .as_deref()
                    .and_then(|s| {
                        s.person_by_external_id(&m.id)
                            .or_else(|| s.person_by_email(&m.email))
                    })
                    .map_or(Availability::Unknown, |p| p.availability);
                let label = match availability {
                    Availability::Unknown => m.name.clone(),
                    other => format!("{} ({})", m.name, other.label()),
                };
                PickerOption::new(m.id.clone(), label)
            })
            .collect();

        let text = format!("Who should do *{}*?", session.selections.task.title);
        let blocks = picker_blocks(
            &text,
            &options,
            page,
            "person",
            &[("No assignee", "person_none")],
            showing_all.then_some(SHOWING_ALL_MEMBERS_WARNING),
        );
        self.prompt(session, &text, Some(&blocks)).await?;
        Ok(())
    }

    async fn on_person_picked(
        &self,
        session: &mut Session,
        member_id: Option<&str>,
        showing_all: bool,
    ) -> StepResult {
        let auth = self.auth_for(&session.user_id).await?;

        {
            let task = &mut session.selections.task;
            task.assignee_id = None;
            task.assignee_name = None;
            task.assignee_email = None;
            task.chat_user_id = None;
        }

        if let Some(member_id) = member_id {
            let member = match self
                .assignee_candidates(
                    &auth,
                    session.selections.task.project_id.as_deref(),
                    showing_all,
                )
                .await
            {
                Ok((members, _)) => members.into_iter().find(|m| m.id == member_id),
                Err(e) => {
                    warn!(error = %e, "Could not re-read members for picked assignee");
                    None
                }
            };
            let snapshot = self.directory.snapshot().await.ok();
            let person = snapshot.as_deref().and_then(|s| {
                s.person_by_external_id(member_id).or_else(|| {
                    member
                        .as_ref()
                        .and_then(|m| s.person_by_email(&m.email))
                })
            });

            let task = &mut session.selections.task;
            task.assignee_id = Some(member_id.to_string());
            task.assignee_name = member
                .as_ref()
                .map(|m| m.name.clone())
                .or_else(|| person.map(|p| p.name.clone()));
            task.assignee_email = member
                .as_ref()
                .map(|m| m.email.clone())
                .filter(|e| !e.is_empty());
            task.chat_user_id = person.and_then(|p| p.chat_user_id.clone());
            info!(assignee_id = member_id, "Assignee picked");
        }

        if session.selections.task.due_resolved {
            return self.create_single(session, &auth).await;
        }
        session.state = WizardState::AwaitingDueDate;
        self.ask_due_date(session).await?;
        Ok(())
    }

    async fn ask_due_date(&self, session: &mut Session) -> Result<(), BotError> {
        let text = due_date_prompt(&session.selections.task.title, self.clock.today());
        self.prompt(session, &text, None).await
    }

    async fn on_due_text(&self, session: &mut Session, text: &str) -> StepResult {
        let Some(due_on) = parse_due(text, self.clock.today()).settled() else {
            debug!(text, "Due date not understood, re-prompting");
            self.say(&session.channel_id, INVALID_DUE_DATE).await;
            return Ok(());
        };
        session.selections.task.due_on = due_on;
        session.selections.task.due_resolved = true;

        let auth = self.auth_for(&session.user_id).await?;
        self.create_single(session, &auth).await
    }

    async fn create_single(&self, session: &mut Session, auth: &WorkspaceAuth) -> StepResult {
        let task = session.selections.task.clone();
        let created = self.pipeline.create_work_item(auth, &task).await?;

        let text = created_text(
            &task,
            &created.work_item.url,
            created.warning.as_deref(),
        );
        self.say(&session.channel_id, &text).await;
        session.reset();
        Ok(())
    }

    async fn set_status(&self, user_id: &str, text: &str) {
        let Some(status) = Availability::from_keyword(text) else {
            self.tell_user(user_id, "Usage: `/status available|busy|away|ooo`")
                .await;
            return;
        };

        let person_id = match self.directory.snapshot().await {
            Ok(snapshot) => snapshot
                .person_by_chat_id(user_id)
                .map(|p| p.id.clone().unwrap_or_else(|| user_id.to_string())),
            Err(e) => {
                warn!(error = %e, "Directory unavailable for status update");
                None
            }
        };
        let Some(person_id) = person_id else {
            self.tell_user(user_id, "I couldn't find you in the team directory.")
                .await;
            return;
        };

        let reply = match self
            .directory
            .service()
            .set_person_availability(&person_id, status)
            .await
        {
            Ok(true) => {
                if let Err(e) = self.directory.force_refresh().await {
                    warn!(error = %e, "Refresh after status update failed");
                }
                format!("Your status is now *{}*.", status.label())
            }
            Ok(false) => "I couldn't find you in the team directory.".to_string(),
            Err(e) => {
                warn!(error = %e, "Availability update failed");
                e.user_message().to_string()
            }
        };
        self.tell_user(user_id, &reply).await;
    }
}

fn project_options(projects: &[Project]) -> Vec<PickerOption> {
    projects
        .iter()
        .map(|p| PickerOption::new(p.id.clone(), p.name.clone()))
        .collect()
}

fn directory_context(projects: &[Project], snapshot: &DirectorySnapshot) -> DirectoryContext {
    DirectoryContext {
        projects: projects
            .iter()
            .map(|p| NamedRef {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect(),
        people: snapshot.people_summaries(),
    }
}
