//! Per-user wizard state.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::models::{MessageRef, ResolvedTask};

/// Where a user's conversation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardState {
    #[default]
    Idle,
    AwaitingIntent,
    Confirming,
    SelectingProject {
        page: usize,
    },
    SelectingTodoList {
        page: usize,
    },
    SelectingAssignee {
        page: usize,
        /// The picker fell back to every workspace member.
        showing_all: bool,
    },
    AwaitingDueDate,
    BatchSelectingProject {
        task_index: usize,
        page: usize,
    },
    BatchSelectingTodoList {
        task_index: usize,
        page: usize,
    },
    BatchAwaitingDueDate {
        task_index: usize,
    },
}

impl WizardState {
    /// Numeric step tag, only used as a log field.
    #[must_use]
    pub fn step(&self) -> u8 {
        match self {
            WizardState::Idle => 0,
            WizardState::AwaitingIntent => 1,
            WizardState::Confirming => 2,
            WizardState::SelectingProject { .. } => 3,
            WizardState::SelectingTodoList { .. } => 4,
            WizardState::SelectingAssignee { .. } => 5,
            WizardState::AwaitingDueDate => 6,
            WizardState::BatchSelectingProject { .. } => 7,
            WizardState::BatchSelectingTodoList { .. } => 8,
            WizardState::BatchAwaitingDueDate { .. } => 9,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            WizardState::Idle => "idle",
            WizardState::AwaitingIntent => "awaiting_intent",
            WizardState::Confirming => "confirming",
            WizardState::SelectingProject { .. } => "selecting_project",
            WizardState::SelectingTodoList { .. } => "selecting_todo_list",
            WizardState::SelectingAssignee { .. } => "selecting_assignee",
            WizardState::AwaitingDueDate => "awaiting_due_date",
            WizardState::BatchSelectingProject { .. } => "batch_selecting_project",
            WizardState::BatchSelectingTodoList { .. } => "batch_selecting_todo_list",
            WizardState::BatchAwaitingDueDate { .. } => "batch_awaiting_due_date",
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, WizardState::Idle)
    }
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the wizard has collected so far for a single task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    pub task: ResolvedTask,
    pub original_message: Option<String>,
}

impl Selections {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Selections::default()
    }
}

/// Fields a batch task can still be missing, asked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MissingField {
    Project,
    TodoList,
    DueDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInfo {
    pub task_index: usize,
    pub missing: Vec<MissingField>,
}

impl PendingInfo {
    /// Adds a field, keeping the fixed ask order.
    pub fn require(&mut self, field: MissingField) {
        if !self.missing.contains(&field) {
            self.missing.push(field);
            self.missing.sort();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub tasks: Vec<ResolvedTask>,
    pub needing_info: Vec<PendingInfo>,
    /// Index into `needing_info`.
    pub current: usize,
}

impl BatchProgress {
    #[must_use]
    pub fn current_entry(&self) -> Option<&PendingInfo> {
        self.needing_info.get(self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub channel_id: String,
    pub state: WizardState,
    pub selections: Selections,
    /// Interactive messages to delete on cancel.
    pub ui_messages: Vec<MessageRef>,
    pub batch: Option<BatchProgress>,
    /// Bumped on every reset; work started under an older generation is stale.
    pub generation: u64,
}

impl Session {
    #[must_use]
    pub fn new(user_id: &str, channel_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            state: WizardState::Idle,
            selections: Selections::default(),
            ui_messages: Vec::new(),
            batch: None,
            generation: 0,
        }
    }

    /// Back to Idle with nothing collected. Returns the UI messages that were
    /// being tracked so the caller can clean them up.
    pub fn reset(&mut self) -> Vec<MessageRef> {
        self.state = WizardState::Idle;
        self.selections = Selections::default();
        self.batch = None;
        self.generation += 1;
        std::mem::take(&mut self.ui_messages)
    }
}

/// Sessions keyed by user id. Load, mutate, save; last write wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, user_id: &str) -> Option<Session>;

    async fn save(&self, session: Session);

    async fn remove(&self, user_id: &str);
}

/// Process-local store; an in-flight wizard is lost on a cold start.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, user_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(user_id).cloned()
    }

    async fn save(&self, session: Session) {
        self.sessions
            .lock()
            .await
            .insert(session.user_id.clone(), session);
    }

    async fn remove(&self, user_id: &str) {
        self.sessions.lock().await.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_everything_and_bumps_generation() {
        let mut session = Session::new("U1", "D1");
        session.state = WizardState::SelectingAssignee {
            page: 1,
            showing_all: true,
        };
        session.selections.task.title = "x".into();
        session.ui_messages.push(MessageRef {
            channel: "D1".into(),
            ts: "1".into(),
        });
        session.batch = Some(BatchProgress::default());

        let tracked = session.reset();
        assert_eq!(tracked.len(), 1);
        assert!(session.state.is_idle());
        assert!(session.selections.is_empty());
        assert!(session.ui_messages.is_empty());
        assert!(session.batch.is_none());
        assert_eq!(session.generation, 1);
    }

    #[test]
    fn steps_match_legacy_tags() {
        assert_eq!(WizardState::Idle.step(), 0);
        assert_eq!(WizardState::AwaitingDueDate.step(), 6);
        assert_eq!(
            WizardState::BatchAwaitingDueDate { task_index: 2 }.step(),
            9
        );
        assert_eq!(WizardState::Confirming.to_string(), "confirming");
    }

    #[test]
    fn pending_info_keeps_ask_order() {
        let mut info = PendingInfo {
            task_index: 0,
            missing: vec![MissingField::Project, MissingField::DueDate],
        };
        info.require(MissingField::TodoList);
        info.require(MissingField::TodoList);
        assert_eq!(
            info.missing,
            vec![
                MissingField::Project,
                MissingField::TodoList,
                MissingField::DueDate
            ]
        );
    }

    #[tokio::test]
    async fn store_round_trips_by_user() {
        let store = InMemorySessionStore::new();
        assert!(store.load("U1").await.is_none());
        let mut session = Session::new("U1", "D1");
        session.state = WizardState::Confirming;
        store.save(session.clone()).await;
        assert_eq!(store.load("U1").await, Some(session));
        store.remove("U1").await;
        assert!(store.load("U1").await.is_none());
    }
}
