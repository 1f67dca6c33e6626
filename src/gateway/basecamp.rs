//! Basecamp 3 implementation of the work-management gateway.
//!
//! Projects expose their to-do set through the project "dock"; lists and to-dos
//! live under `/buckets/{project_id}`. Collection endpoints are paginated via
//! the `Link: <...>; rel="next"` response header.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use super::WorkItemGateway;
use crate::core::models::{Member, NewTodo, Project, TodoList, WorkItem, WorkspaceAuth};
use crate::errors::BotError;
use crate::utils::ids::string_or_number;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// Hard stop for runaway pagination.
const MAX_PAGES: usize = 50;

static NEXT_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("static regex compile"));

#[derive(Debug, Deserialize)]
struct BcDockEntry {
    name: String,
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct BcProject {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    name: String,
    #[serde(default)]
    dock: Vec<BcDockEntry>,
}

impl From<BcProject> for Project {
    fn from(p: BcProject) -> Self {
        let todoset_id = p
            .dock
            .into_iter()
            .find(|d| d.name == "todoset" && d.enabled)
            .map(|d| d.id);
        Project {
            id: p.id,
            name: p.name,
            todoset_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BcTodoList {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl From<BcTodoList> for TodoList {
    fn from(l: BcTodoList) -> Self {
        TodoList {
            id: l.id,
            name: l.name.or(l.title).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BcTodo {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    assignees: Vec<Member>,
    #[serde(default)]
    due_on: Option<NaiveDate>,
    #[serde(default)]
    app_url: String,
}

impl From<BcTodo> for WorkItem {
    fn from(t: BcTodo) -> Self {
        WorkItem {
            id: t.id,
            title: t.content,
            description: t.description,
            assignees: t.assignees,
            due_on: t.due_on,
            url: t.app_url,
        }
    }
}

/// Extracts the `rel="next"` target from a `Link` header. Only absolute
/// http(s) targets are followed.
#[must_use]
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find_map(|part| {
            NEXT_LINK_RE
                .captures(part)
                .and_then(|c| c.get(1))
                .and_then(|m| Url::parse(m.as_str()).ok())
                .filter(|u| matches!(u.scheme(), "http" | "https"))
                .map(String::from)
        })
}

/// Numeric ids go out as JSON numbers, anything else as strings.
fn id_value(id: &str) -> Value {
    id.parse::<i64>().map_or_else(|_| json!(id), |n| json!(n))
}

pub struct BasecampGateway {
    http: Client,
    base_url: String,
    user_agent: String,
    retry: RetryPolicy,
}

impl BasecampGateway {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| BotError::HttpError(format!("Failed to build gateway client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            retry: RetryPolicy::http(),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, auth: &WorkspaceAuth, path: &str) -> String {
        format!("{}/{}{path}", self.base_url, auth.account_id)
    }

    async fn send(
        &self,
        auth: &WorkspaceAuth,
        method: reqwest::Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, BotError> {
        retry_with_backoff(
            self.retry,
            || {
                let method = method.clone();
                async move {
                    let mut request = self
                        .http
                        .request(method, url)
                        .bearer_auth(&auth.access_token)
                        .header(reqwest::header::USER_AGENT, &self.user_agent);
                    if let Some(body) = body {
                        request = request.json(body);
                    }
                    let response = request.send().await?;
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let message = response.text().await.unwrap_or_default();
                    Err(BotError::GatewayError {
                        status: status.as_u16(),
                        message,
                    })
                }
            },
            BotError::is_retryable,
        )
        .await
    }

    async fn get_one<T: DeserializeOwned>(
        &self,
        auth: &WorkspaceAuth,
        url: &str,
    ) -> Result<T, BotError> {
        let response = self.send(auth, reqwest::Method::GET, url, None).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get_all<T: DeserializeOwned>(
        &self,
        auth: &WorkspaceAuth,
        first_url: String,
    ) -> Result<Vec<T>, BotError> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;

        while let Some(url) = next {
            let response = self.send(auth, reqwest::Method::GET, &url, None).await?;
            next = next_page_url(response.headers());
            let mut page: Vec<T> = response.json().await?;
            items.append(&mut page);

            pages += 1;
            if pages >= MAX_PAGES {
                debug!(url = %url, "Stopping pagination at page limit");
                break;
            }
        }
        Ok(items)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        auth: &WorkspaceAuth,
        url: &str,
        body: &Value,
    ) -> Result<T, BotError> {
        let response = self
            .send(auth, reqwest::Method::POST, url, Some(body))
            .await?;
        Ok(response.json::<T>().await?)
    }

    async fn todoset_id(&self, auth: &WorkspaceAuth, project_id: &str) -> Result<String, BotError> {
        self.get_project(auth, project_id)
            .await?
            .todoset_id
            .ok_or_else(|| BotError::GatewayError {
                status: 404,
                message: format!("project {project_id} has no to-do set"),
            })
    }
}

#[async_trait]
impl WorkItemGateway for BasecampGateway {
    async fn list_projects(&self, auth: &WorkspaceAuth) -> Result<Vec<Project>, BotError> {
        let projects: Vec<BcProject> = self.get_all(auth, self.url(auth, "/projects.json")).await?;
        Ok(projects.into_iter().map(Project::from).collect())
    }

    async fn get_project(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Project, BotError> {
        let url = self.url(auth, &format!("/projects/{project_id}.json"));
        let project: BcProject = self.get_one(auth, &url).await?;
        Ok(project.into())
    }

    async fn list_todo_lists(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Vec<TodoList>, BotError> {
        let todoset_id = self.todoset_id(auth, project_id).await?;
        let url = self.url(
            auth,
            &format!("/buckets/{project_id}/todosets/{todoset_id}/todolists.json"),
        );
        let lists: Vec<BcTodoList> = self.get_all(auth, url).await?;
        Ok(lists.into_iter().map(TodoList::from).collect())
    }

    async fn create_todo_list(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
        name: &str,
    ) -> Result<TodoList, BotError> {
        let todoset_id = self.todoset_id(auth, project_id).await?;
        let url = self.url(
            auth,
            &format!("/buckets/{project_id}/todosets/{todoset_id}/todolists.json"),
        );
        let list: BcTodoList = self.post_json(auth, &url, &json!({ "name": name })).await?;
        info!(project_id, todo_list_id = %list.id, "Created to-do list");
        Ok(list.into())
    }

    async fn list_project_members(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Vec<Member>, BotError> {
        self.get_all(auth, self.url(auth, &format!("/projects/{project_id}/people.json")))
            .await
    }

    async fn list_workspace_members(&self, auth: &WorkspaceAuth) -> Result<Vec<Member>, BotError> {
        self.get_all(auth, self.url(auth, "/people.json")).await
    }

    async fn create_todo(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
        todo_list_id: &str,
        todo: &NewTodo,
    ) -> Result<WorkItem, BotError> {
        let url = self.url(
            auth,
            &format!("/buckets/{project_id}/todolists/{todo_list_id}/todos.json"),
        );
        let mut body = json!({
            "content": todo.title,
            "description": todo.description,
            "assignee_ids": todo.assignee_ids.iter().map(|id| id_value(id)).collect::<Vec<_>>(),
        });
        if let Some(due) = todo.due_on {
            body["due_on"] = json!(due.format("%Y-%m-%d").to_string());
        }

        let created: BcTodo = self.post_json(auth, &url, &body).await?;
        info!(project_id, work_item_id = %created.id, "Created to-do");
        Ok(created.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn finds_next_link() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://3.basecampapi.com/1/projects.json?page=1>; rel="prev", <https://3.basecampapi.com/1/projects.json?page=3>; rel="next""#,
            ),
        );
        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://3.basecampapi.com/1/projects.json?page=3")
        );
    }

    #[test]
    fn no_link_means_last_page() {
        assert!(next_page_url(&HeaderMap::new()).is_none());
    }

    #[test]
    fn relative_next_link_is_not_followed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(r#"</projects.json?page=2>; rel="next""#),
        );
        assert!(next_page_url(&headers).is_none());
    }

    #[test]
    fn project_picks_enabled_todoset_from_dock() {
        let raw = r#"{"id": 10, "name": "Web", "dock": [
            {"name": "message_board", "id": 1, "enabled": true},
            {"name": "todoset", "id": 2, "enabled": true}
        ]}"#;
        let project: Project = serde_json::from_str::<BcProject>(raw).unwrap().into();
        assert_eq!(project.id, "10");
        assert_eq!(project.todoset_id.as_deref(), Some("2"));
    }

    #[test]
    fn todo_maps_to_work_item() {
        let raw = r#"{"id": 99, "content": "Ship it", "description": "<div>now</div>",
            "assignees": [{"id": 5, "name": "Ada", "email_address": "ada@example.com"}],
            "due_on": "2025-03-07", "app_url": "https://3.basecamp.com/1/buckets/10/todos/99"}"#;
        let item: WorkItem = serde_json::from_str::<BcTodo>(raw).unwrap().into();
        assert_eq!(item.id, "99");
        assert_eq!(item.title, "Ship it");
        assert_eq!(item.assignees[0].id, "5");
        assert_eq!(item.assignees[0].email, "ada@example.com");
        assert_eq!(item.due_on, NaiveDate::from_ymd_opt(2025, 3, 7));
    }

    #[test]
    fn todo_list_decodes_with_both_title_and_name() {
        let raw = r#"{"id": 1069479424, "status": "active", "title": "Launch",
            "type": "Todolist", "name": "Launch", "completed": false,
            "app_url": "https://3.basecamp.com/1/buckets/10/todolists/1069479424"}"#;
        let list: TodoList = serde_json::from_str::<BcTodoList>(raw).unwrap().into();
        assert_eq!(list.id, "1069479424");
        assert_eq!(list.name, "Launch");

        let title_only: TodoList = serde_json::from_str::<BcTodoList>(r#"{"id": 7, "title": "Backlog"}"#)
            .unwrap()
            .into();
        assert_eq!(title_only.name, "Backlog");
    }

    #[test]
    fn numeric_ids_are_sent_as_numbers() {
        assert_eq!(id_value("42"), json!(42));
        assert_eq!(id_value("abc"), json!("abc"));
    }

    #[test]
    fn urls_are_account_scoped() {
        let gateway = BasecampGateway::new("https://3.basecampapi.com/", "taskbot").unwrap();
        let auth = WorkspaceAuth {
            access_token: "t".into(),
            account_id: "123".into(),
        };
        assert_eq!(
            gateway.url(&auth, "/projects.json"),
            "https://3.basecampapi.com/123/projects.json"
        );
    }
}
