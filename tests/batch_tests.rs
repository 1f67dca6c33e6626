mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::NaiveDate;
use serde_json::json;
use support::{Harness, USER, auth};
use taskbot::core::models::{CreationFailure, ResolvedTask};
use taskbot::engine::{CreationPipeline, SessionStore};
use taskbot::gateway::WorkItemGateway;

fn three_tasks() -> serde_json::Value {
    json!({"tasks": [
        {"title": "Fix login", "description": "fix it", "project_name": "Website",
         "assignee_names": ["Ada"], "due_date": "tomorrow"},
        {"title": "Write notes", "description": "notes", "project_name": null,
         "assignee_names": ["Grace"], "due_date": "skip"},
        {"title": "Plan sprint", "description": "plan", "project_name": "Acme Corp",
         "assignee_names": [], "due_date": null}
    ]})
}

fn ready_task(title: &str, project_id: Option<&str>) -> ResolvedTask {
    ResolvedTask {
        title: title.to_string(),
        description: format!("{title} details"),
        project_id: project_id.map(ToString::to_string),
        due_resolved: true,
        ..ResolvedTask::default()
    }
}

#[tokio::test]
async fn batch_asks_only_for_missing_fields_then_creates_all() {
    let h = Harness::new();
    h.completion.reply(three_tasks());

    h.say("three things for the team").await;
    assert!(h.chat.texts().iter().any(|t| t == "I found 3 tasks in your message."));
    assert_eq!(h.state_name().await, "batch_selecting_project");
    assert!(h.chat.last_action_ids().contains(&"batch_project_1".to_string()));

    h.press("batch_project_1").await;
    // Website has one list, so task 3's list is next
    assert_eq!(h.state_name().await, "batch_selecting_todo_list");
    assert!(h.chat.last_action_ids().contains(&"batch_todolist_22".to_string()));

    h.press("batch_todolist_22").await;
    assert_eq!(h.state_name().await, "batch_awaiting_due_date");

    h.say("friday").await;
    assert_eq!(h.state_name().await, "idle");

    let created = h.gateway.created();
    let titles: Vec<&str> = created.iter().map(|c| c.todo.title.as_str()).collect();
    assert_eq!(titles, vec!["Fix login", "Write notes", "Plan sprint"]);

    assert_eq!(created[0].todo_list_id, "11");
    assert_eq!(created[0].todo.assignee_ids, vec!["7".to_string()]);
    assert_eq!(created[0].todo.due_on, NaiveDate::from_ymd_opt(2025, 3, 13));

    // Grace has no external id; her workspace member id comes from her email
    assert_eq!(created[1].project_id, "1");
    assert_eq!(created[1].todo.assignee_ids, vec!["8".to_string()]);
    assert_eq!(created[1].todo.due_on, None);

    assert_eq!(created[2].todo_list_id, "22");
    assert!(created[2].todo.assignee_ids.is_empty());
    assert_eq!(created[2].todo.due_on, NaiveDate::from_ymd_opt(2025, 3, 14));

    assert!(h.chat.last_text().starts_with("Created 3 of 3 tasks"));
    assert_eq!(h.gateway.workspace_member_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fully_resolved_batch_is_created_without_questions() {
    let h = Harness::new();
    h.completion.reply(json!({"tasks": [
        {"title": "A", "description": "a", "project_name": "Website", "assignee_names": ["Ada"], "due_date": "today"},
        {"title": "B", "description": "b", "project_name": "Website", "assignee_names": [], "due_date": "skip"}
    ]}));

    h.say("a and b").await;

    assert_eq!(h.gateway.created().len(), 2);
    assert!(h.chat.last_text().starts_with("Created 2 of 2 tasks"));
    assert_eq!(h.state_name().await, "idle");
}

#[tokio::test]
async fn invalid_batch_due_date_keeps_asking_the_same_task() {
    let h = Harness::new();
    h.completion.reply(json!({"tasks": [
        {"title": "A", "description": "a", "project_name": "Website", "due_date": null},
        {"title": "B", "description": "b", "project_name": "Website", "due_date": "skip"}
    ]}));

    h.say("a and b").await;
    h.say("whenever").await;
    let session = h.sessions.load(USER).await.unwrap();
    assert_eq!(session.state.name(), "batch_awaiting_due_date");
    assert!(h.gateway.created().is_empty());

    h.say("2025-04-01").await;
    let created = h.gateway.created();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].todo.due_on, NaiveDate::from_ymd_opt(2025, 4, 1));
}

#[tokio::test]
async fn batch_failures_are_isolated_and_reported_in_order() {
    let h = Harness::new();
    h.gateway.fail_title("B");
    let pipeline = CreationPipeline::new(h.gateway.clone(), Arc::clone(&h.notifier));

    let tasks = vec![
        ready_task("A", Some("1")),
        ready_task("B", Some("1")),
        ready_task("C", None),
        ready_task("D", Some("2")),
    ];
    let outcomes = pipeline.create_batch(&auth(), &tasks).await;

    let titles: Vec<&str> = outcomes.iter().map(|o| o.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B", "C", "D"]);
    assert!(outcomes[0].is_success());
    assert!(matches!(outcomes[1].result, Err(CreationFailure::Gateway(_))));
    assert_eq!(outcomes[2].result, Err(CreationFailure::NoProject));
    assert!(outcomes[3].is_success());

    // C was never attempted; D landed on the first of Acme's lists
    assert_eq!(h.gateway.create_calls.load(Ordering::SeqCst), 3);
    let created = h.gateway.created();
    assert_eq!(created.last().unwrap().todo_list_id, "21");
}

#[tokio::test]
async fn notification_failures_never_fail_creation() {
    let h = Harness::new();
    h.chat.fail_dms.store(true, Ordering::SeqCst);
    let pipeline = CreationPipeline::new(h.gateway.clone(), Arc::clone(&h.notifier));

    let mut task = ready_task("Notify me", Some("1"));
    task.todo_list_id = Some("11".into());
    task.assignee_id = Some("7".into());
    task.chat_user_id = Some("U-ADA".into());

    let created = pipeline.create_work_item(&auth(), &task).await.unwrap();
    assert_eq!(created.work_item.id, "todo-1");
    assert!(created.warning.is_none());
    assert!(h.chat.dms().is_empty());
}

#[tokio::test]
async fn missing_assignee_on_created_item_is_flagged() {
    let h = Harness::new();
    h.gateway.drop_assignees.store(true, Ordering::SeqCst);
    let pipeline = CreationPipeline::new(h.gateway.clone(), Arc::clone(&h.notifier));

    let mut task = ready_task("Lost assignee", Some("1"));
    task.todo_list_id = Some("11".into());
    task.assignee_id = Some("7".into());
    task.chat_user_id = Some("U-ADA".into());

    let created = pipeline.create_work_item(&auth(), &task).await.unwrap();
    assert!(created.warning.is_some());
    // nobody was actually assigned, so nobody is told they were
    assert!(h.chat.dms().is_empty());
}

#[tokio::test]
async fn non_member_assignee_is_still_created() {
    let h = Harness::new();
    let pipeline = CreationPipeline::new(h.gateway.clone(), Arc::clone(&h.notifier));

    assert_eq!(
        pipeline.verify_membership(&auth(), "1", "9").await,
        Some(false)
    );

    let mut task = ready_task("Outsider", Some("1"));
    task.todo_list_id = Some("11".into());
    task.assignee_id = Some("9".into());
    let created = pipeline.create_work_item(&auth(), &task).await.unwrap();
    assert_eq!(created.work_item.assignees.len(), 1);

    h.gateway.project_members_fail.store(true, Ordering::SeqCst);
    assert_eq!(pipeline.verify_membership(&auth(), "1", "9").await, None);
}

#[tokio::test]
async fn default_list_is_created_once_for_empty_project() {
    let h = Harness::new();
    h.gateway.add_project("5", "Fresh", &[]);
    let pipeline = CreationPipeline::new(h.gateway.clone(), Arc::clone(&h.notifier));

    let first = pipeline.ensure_todo_list(&auth(), "5").await.unwrap();
    let second = pipeline.ensure_todo_list(&auth(), "5").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.gateway.created_lists.lock().unwrap().len(), 1);
    let lists = h.gateway.list_todo_lists(&auth(), "5").await.unwrap();
    assert_eq!(lists[0].name, "Tasks");
}

#[tokio::test]
async fn batch_summary_lists_every_task_even_when_dms_fail() {
    let h = Harness::new();
    h.chat.fail_dms.store(true, Ordering::SeqCst);
    h.completion.reply(json!({"tasks": [
        {"title": "First", "description": "1", "project_name": "Website",
         "assignee_names": ["Ada"], "due_date": "skip"},
        {"title": "Second", "description": "2", "project_name": "Nowhere", "due_date": "skip"},
        {"title": "Third", "description": "3", "project_name": "Website", "due_date": "skip"}
    ]}));

    h.say("three tasks").await;
    // create the scanned tasks as they stand, task 2 still without a project
    assert_eq!(h.state_name().await, "batch_selecting_project");
    let session = h.sessions.load(USER).await.unwrap();
    let tasks = session.batch.unwrap().tasks;

    let pipeline = CreationPipeline::new(h.gateway.clone(), Arc::clone(&h.notifier));
    let outcomes = pipeline.create_batch(&auth(), &tasks).await;
    let (summary, _) = taskbot::slack::blocks::batch_summary(&outcomes);

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].result, Err(CreationFailure::NoProject));
    assert!(outcomes[2].is_success());

    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines[0], "Created 2 of 3 tasks");
    assert!(lines[1].contains("todo-1|First"));
    assert!(lines[2].contains("Second (no project)"));
    assert!(lines[3].contains("todo-2|Third"));
    assert!(h.chat.dms().is_empty());
}
