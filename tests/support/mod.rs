//! In-memory fakes for every external seam, plus a wired-up engine.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use openai_api_rs::v1::chat_completion::ChatCompletionMessage;
use serde_json::{Value, json};
use tokio::sync::Notify;

use taskbot::ai::{CompletionProvider, IntentExtractor};
use taskbot::core::models::{
    Availability, Member, MessageRef, NewTodo, Person, Project, ProjectChannelMapping, TodoList,
    WorkItem, WorkspaceAuth,
};
use taskbot::core::user_tokens::{CredentialStore, StoredCredential};
use taskbot::directory::{DirectoryCache, DirectoryService};
use taskbot::engine::{ConversationEngine, EngineParts, InMemorySessionStore, SessionStore};
use taskbot::errors::BotError;
use taskbot::gateway::WorkItemGateway;
use taskbot::notify::NotificationDispatcher;
use taskbot::slack::ChatTransport;
use taskbot::utils::clock::{Clock, ManualClock};
use taskbot::utils::retry::RetryPolicy;

pub const USER: &str = "U1";
pub const DM_CHANNEL: &str = "D1";

pub fn today() -> NaiveDate {
    // a Wednesday
    NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
}

// ----------------------------------------------------------------------------
// Completion
// ----------------------------------------------------------------------------

/// Replays scripted completions in order; once exhausted, every call fails.
#[derive(Default)]
pub struct FakeCompletion {
    replies: Mutex<VecDeque<Result<String, BotError>>>,
    pub calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    pub started: Notify,
}

impl FakeCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, body: Value) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(body.to_string()));
        self
    }

    pub fn reply_raw(&self, body: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(body.to_string()));
        self
    }

    pub fn fail(&self, error: BotError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes every later call wait until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, _prompt: Vec<ChatCompletionMessage>) -> Result<String, BotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BotError::OpenAIError("no scripted reply".into())))
    }
}

// ----------------------------------------------------------------------------
// Directory
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeDirectory {
    pub people: Mutex<Vec<Person>>,
    pub channels: Mutex<ProjectChannelMapping>,
    pub failing: AtomicBool,
    pub loads: AtomicUsize,
    pub availability_updates: Mutex<Vec<(String, Availability)>>,
}

impl FakeDirectory {
    pub fn with_people(people: Vec<Person>) -> Self {
        Self {
            people: Mutex::new(people),
            ..Self::default()
        }
    }

    pub fn map_channel(&self, project_id: &str, channel: &str) {
        self.channels
            .lock()
            .unwrap()
            .insert(project_id.to_string(), channel.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn list_people(&self) -> Result<Vec<Person>, BotError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::DirectoryError("directory down".into()));
        }
        Ok(self.people.lock().unwrap().clone())
    }

    async fn list_project_channel_mappings(&self) -> Result<ProjectChannelMapping, BotError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BotError::DirectoryError("directory down".into()));
        }
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn set_person_availability(
        &self,
        person_id: &str,
        status: Availability,
    ) -> Result<bool, BotError> {
        let mut people = self.people.lock().unwrap();
        let Some(person) = people
            .iter_mut()
            .find(|p| p.id.as_deref() == Some(person_id))
        else {
            return Ok(false);
        };
        person.availability = status;
        self.availability_updates
            .lock()
            .unwrap()
            .push((person_id.to_string(), status));
        Ok(true)
    }
}

pub fn person(name: &str, email: &str, chat: Option<&str>, external: Option<&str>) -> Person {
    Person {
        id: Some(format!("dir-{}", name.to_lowercase().replace(' ', "-"))),
        name: name.to_string(),
        email: email.to_string(),
        chat_user_id: chat.map(ToString::to_string),
        external_id: external.map(ToString::to_string),
        availability: Availability::Available,
    }
}

// ----------------------------------------------------------------------------
// Work-management gateway
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreatedTodo {
    pub project_id: String,
    pub todo_list_id: String,
    pub todo: NewTodo,
}

#[derive(Default)]
pub struct FakeGateway {
    pub projects: Mutex<Vec<Project>>,
    pub lists: Mutex<HashMap<String, Vec<TodoList>>>,
    pub project_members: Mutex<HashMap<String, Vec<Member>>>,
    pub workspace_members: Mutex<Vec<Member>>,
    pub created: Mutex<Vec<CreatedTodo>>,
    pub created_lists: Mutex<Vec<(String, String)>>,
    pub fail_titles: Mutex<HashSet<String>>,
    pub project_members_fail: AtomicBool,
    pub drop_assignees: AtomicBool,
    pub fail_project_listing: AtomicBool,
    pub workspace_member_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl FakeGateway {
    pub fn add_project(&self, id: &str, name: &str, lists: &[(&str, &str)]) {
        self.projects.lock().unwrap().push(Project {
            id: id.to_string(),
            name: name.to_string(),
            todoset_id: Some(format!("ts-{id}")),
        });
        self.lists.lock().unwrap().insert(
            id.to_string(),
            lists
                .iter()
                .map(|(lid, lname)| TodoList {
                    id: (*lid).to_string(),
                    name: (*lname).to_string(),
                })
                .collect(),
        );
    }

    pub fn add_member(&self, project_id: Option<&str>, id: &str, name: &str, email: &str) {
        let member = member(id, name, email);
        if let Some(project_id) = project_id {
            self.project_members
                .lock()
                .unwrap()
                .entry(project_id.to_string())
                .or_default()
                .push(member.clone());
        }
        self.workspace_members.lock().unwrap().push(member);
    }

    pub fn fail_title(&self, title: &str) {
        self.fail_titles.lock().unwrap().insert(title.to_string());
    }

    pub fn created(&self) -> Vec<CreatedTodo> {
        self.created.lock().unwrap().clone()
    }

    fn member_by_id(&self, id: &str) -> Option<Member> {
        self.workspace_members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }
}

pub fn member(id: &str, name: &str, email: &str) -> Member {
    Member {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
    }
}

fn not_found(what: &str) -> BotError {
    BotError::GatewayError {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl WorkItemGateway for FakeGateway {
    async fn list_projects(&self, _auth: &WorkspaceAuth) -> Result<Vec<Project>, BotError> {
        if self.fail_project_listing.load(Ordering::SeqCst) {
            return Err(BotError::GatewayError {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn get_project(
        &self,
        _auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Project, BotError> {
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or_else(|| not_found("project"))
    }

    async fn list_todo_lists(
        &self,
        _auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Vec<TodoList>, BotError> {
        self.lists
            .lock()
            .unwrap()
            .get(project_id)
            .cloned()
            .ok_or_else(|| not_found("project"))
    }

    async fn create_todo_list(
        &self,
        _auth: &WorkspaceAuth,
        project_id: &str,
        name: &str,
    ) -> Result<TodoList, BotError> {
        let list = TodoList {
            id: format!("new-list-{project_id}"),
            name: name.to_string(),
        };
        self.lists
            .lock()
            .unwrap()
            .entry(project_id.to_string())
            .or_default()
            .push(list.clone());
        self.created_lists
            .lock()
            .unwrap()
            .push((project_id.to_string(), name.to_string()));
        Ok(list)
    }

    async fn list_project_members(
        &self,
        _auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Vec<Member>, BotError> {
        if self.project_members_fail.load(Ordering::SeqCst) {
            return Err(BotError::GatewayError {
                status: 500,
                message: "boom".into(),
            });
        }
        Ok(self
            .project_members
            .lock()
            .unwrap()
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_workspace_members(&self, _auth: &WorkspaceAuth) -> Result<Vec<Member>, BotError> {
        self.workspace_member_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.workspace_members.lock().unwrap().clone())
    }

    async fn create_todo(
        &self,
        _auth: &WorkspaceAuth,
        project_id: &str,
        todo_list_id: &str,
        todo: &NewTodo,
    ) -> Result<WorkItem, BotError> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_titles.lock().unwrap().contains(&todo.title) {
            return Err(BotError::GatewayError {
                status: 422,
                message: "rejected".into(),
            });
        }
        self.created.lock().unwrap().push(CreatedTodo {
            project_id: project_id.to_string(),
            todo_list_id: todo_list_id.to_string(),
            todo: todo.clone(),
        });

        let assignees = if self.drop_assignees.load(Ordering::SeqCst) {
            Vec::new()
        } else {
            todo.assignee_ids
                .iter()
                .filter_map(|id| self.member_by_id(id))
                .collect()
        };
        Ok(WorkItem {
            id: format!("todo-{n}"),
            title: todo.title.clone(),
            description: todo.description.clone(),
            assignees,
            due_on: todo.due_on,
            url: format!("https://work.example/{project_id}/todos/todo-{n}"),
        })
    }
}

// ----------------------------------------------------------------------------
// Chat
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Posted {
    pub channel: String,
    pub text: String,
    pub blocks: Option<Value>,
    pub thread_ts: Option<String>,
    pub message: MessageRef,
}

#[derive(Default)]
pub struct FakeChat {
    pub posts: Mutex<Vec<Posted>>,
    pub dms: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<MessageRef>>,
    pub fail_dms: AtomicBool,
    pub fail_posts: AtomicBool,
    counter: AtomicUsize,
}

impl FakeChat {
    fn next_ref(&self, channel: &str) -> MessageRef {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        MessageRef {
            channel: channel.to_string(),
            ts: format!("1700000000.{n:06}"),
        }
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.posts.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|p| p.text).collect()
    }

    pub fn last_text(&self) -> String {
        self.posts().last().map(|p| p.text.clone()).unwrap_or_default()
    }

    pub fn dms(&self) -> Vec<(String, String)> {
        self.dms.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    /// Every `action_id` on buttons in the most recent post carrying blocks.
    pub fn last_action_ids(&self) -> Vec<String> {
        let posts = self.posts();
        let Some(blocks) = posts.iter().rev().find_map(|p| p.blocks.clone()) else {
            return Vec::new();
        };
        blocks
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|b| b.get("elements").and_then(Value::as_array))
            .flatten()
            .filter_map(|e| e.get("action_id").and_then(Value::as_str))
            .map(ToString::to_string)
            .collect()
    }
}

#[async_trait]
impl ChatTransport for FakeChat {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<&Value>,
        thread_ts: Option<&str>,
    ) -> Result<MessageRef, BotError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(BotError::ApiError("channel_not_found".into()));
        }
        let message = self.next_ref(channel);
        self.posts.lock().unwrap().push(Posted {
            channel: channel.to_string(),
            text: text.to_string(),
            blocks: blocks.cloned(),
            thread_ts: thread_ts.map(ToString::to_string),
            message: message.clone(),
        });
        Ok(message)
    }

    async fn send_dm(&self, user_id: &str, text: &str) -> Result<MessageRef, BotError> {
        if self.fail_dms.load(Ordering::SeqCst) {
            return Err(BotError::ApiError("cannot_dm_user".into()));
        }
        self.dms
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(self.next_ref(&format!("D-{user_id}")))
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), BotError> {
        self.deleted.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Credentials
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCredentials {
    pub credentials: Mutex<HashMap<String, StoredCredential>>,
}

impl FakeCredentials {
    pub fn for_user(user_id: &str) -> Self {
        let store = Self::default();
        store.credentials.lock().unwrap().insert(
            user_id.to_string(),
            StoredCredential {
                access_token: "token".into(),
                refresh_token: None,
                account_id: "999".into(),
            },
        );
        store
    }
}

#[async_trait]
impl CredentialStore for FakeCredentials {
    async fn get_credential(
        &self,
        chat_user_id: &str,
    ) -> Result<Option<StoredCredential>, BotError> {
        Ok(self.credentials.lock().unwrap().get(chat_user_id).cloned())
    }
}

pub fn auth() -> WorkspaceAuth {
    WorkspaceAuth {
        access_token: "token".into(),
        account_id: "999".into(),
    }
}

// ----------------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------------

pub struct Harness {
    pub completion: Arc<FakeCompletion>,
    pub directory_service: Arc<FakeDirectory>,
    pub directory: Arc<DirectoryCache>,
    pub gateway: Arc<FakeGateway>,
    pub chat: Arc<FakeChat>,
    pub sessions: Arc<InMemorySessionStore>,
    pub notifier: Arc<NotificationDispatcher>,
    pub clock: Arc<ManualClock>,
    pub engine: ConversationEngine,
}

impl Harness {
    /// Ada (external id 7, chat U-ADA) and Grace (email only) in the
    /// directory; project "Website" (id 1) with a single list and
    /// "Acme Corp" (id 2) with two lists.
    pub fn new() -> Self {
        let directory_service = Arc::new(FakeDirectory::with_people(vec![
            person("Ada Lovelace", "ada@example.com", Some("U-ADA"), Some("7")),
            person("Grace Hopper", "grace@example.com", Some("U-GRACE"), None),
            person("Requester", "me@example.com", Some(USER), None),
        ]));

        let gateway = Arc::new(FakeGateway::default());
        gateway.add_project("1", "Website", &[("11", "To-dos")]);
        gateway.add_project("2", "Acme Corp", &[("21", "Backlog"), ("22", "Sprint")]);
        gateway.add_member(Some("1"), "7", "Ada Lovelace", "ada@example.com");
        gateway.add_member(Some("1"), "8", "Grace Hopper", "grace@example.com");
        gateway.add_member(None, "9", "Linus", "linus@example.com");

        Self::with(directory_service, gateway)
    }

    pub fn with(directory_service: Arc<FakeDirectory>, gateway: Arc<FakeGateway>) -> Self {
        let completion = Arc::new(FakeCompletion::new());
        let clock = Arc::new(ManualClock::new(today()));
        let chat = Arc::new(FakeChat::default());
        let sessions = Arc::new(InMemorySessionStore::new());

        let directory = Arc::new(DirectoryCache::new(
            directory_service.clone(),
            clock.clone() as Arc<dyn Clock>,
            Duration::from_secs(300),
        ));
        let notifier = Arc::new(NotificationDispatcher::new(
            chat.clone(),
            Arc::clone(&directory),
            None,
        ));
        let engine = ConversationEngine::new(EngineParts {
            extractor: IntentExtractor::new(completion.clone())
                .with_retry_policy(RetryPolicy::immediate(3)),
            gateway: gateway.clone(),
            directory: Arc::clone(&directory),
            credentials: Arc::new(FakeCredentials::for_user(USER)),
            sessions: sessions.clone(),
            chat: chat.clone(),
            notifier: Arc::clone(&notifier),
            clock: clock.clone(),
        });

        Self {
            completion,
            directory_service,
            directory,
            gateway,
            chat,
            sessions,
            notifier,
            clock,
            engine,
        }
    }

    pub async fn say(&self, text: &str) {
        self.engine
            .handle_message(USER, DM_CHANNEL, text)
            .await
            .unwrap();
    }

    pub async fn press(&self, action_id: &str) {
        self.engine
            .handle_action(USER, DM_CHANNEL, action_id)
            .await
            .unwrap();
    }

    pub async fn command(&self, command: &str, text: &str) {
        self.engine
            .handle_command(USER, DM_CHANNEL, command, text)
            .await
            .unwrap();
    }

    pub async fn state_name(&self) -> &'static str {
        self.sessions
            .load(USER)
            .await
            .map_or("idle", |s| s.state.name())
    }
}

pub fn single_task(title: &str, project: Option<&str>, assignee: Option<&str>, due: Option<&str>) -> Value {
    json!({
        "title": title,
        "description": format!("{title} (details)"),
        "project_name": project,
        "assignee_names": assignee.map(|a| vec![a]).unwrap_or_default(),
        "due_date": due,
    })
}
