//! Work-management API access (projects, to-do lists, to-dos, people).

pub mod basecamp;

use async_trait::async_trait;

use crate::core::models::{Member, NewTodo, Project, TodoList, WorkItem, WorkspaceAuth};
use crate::errors::BotError;

pub use basecamp::BasecampGateway;

/// Every call is authenticated as the end user the request is made for.
#[async_trait]
pub trait WorkItemGateway: Send + Sync {
    async fn list_projects(&self, auth: &WorkspaceAuth) -> Result<Vec<Project>, BotError>;

    async fn get_project(&self, auth: &WorkspaceAuth, project_id: &str)
    -> Result<Project, BotError>;

    async fn list_todo_lists(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Vec<TodoList>, BotError>;

    async fn create_todo_list(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
        name: &str,
    ) -> Result<TodoList, BotError>;

    async fn list_project_members(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
    ) -> Result<Vec<Member>, BotError>;

    async fn list_workspace_members(&self, auth: &WorkspaceAuth) -> Result<Vec<Member>, BotError>;

    async fn create_todo(
        &self,
        auth: &WorkspaceAuth,
        project_id: &str,
        todo_list_id: &str,
        todo: &NewTodo,
    ) -> Result<WorkItem, BotError>;
}
