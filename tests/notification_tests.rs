mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use support::Harness;
use taskbot::core::models::{PersonRef, WorkItemEvent, WorkItemEventKind};
use taskbot::notify::NotificationDispatcher;

fn event(kind: WorkItemEventKind, id: &str, project_id: &str) -> WorkItemEvent {
    WorkItemEvent {
        kind,
        work_item_id: id.to_string(),
        parent_id: None,
        project_id: Some(project_id.to_string()),
        project_name: Some("Website".into()),
        title: "Fix login".into(),
        url: Some(format!("https://work.example/{project_id}/todos/{id}")),
        assignees: vec![PersonRef {
            id: Some("7".into()),
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
        }],
        creator: Some(PersonRef {
            id: None,
            name: "Grace Hopper".into(),
            email: "grace@example.com".into(),
        }),
        comment: None,
    }
}

#[tokio::test]
async fn lifecycle_events_thread_under_the_created_post() {
    let h = Harness::new();
    h.directory_service.map_channel("1", "C-WEB");

    h.notifier
        .handle_event(&event(WorkItemEventKind::Created, "t1", "1"))
        .await;
    let posts = h.chat.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel, "C-WEB");
    assert!(posts[0].thread_ts.is_none());
    // the creator is mentioned through their chat identity
    assert!(posts[0].text.contains("<@U-GRACE> created"));
    assert_eq!(h.chat.dms()[0].0, "U-ADA");
    let root_ts = posts[0].message.ts.clone();

    let mut comment = event(WorkItemEventKind::Commented, "c1", "1");
    comment.parent_id = Some("t1".into());
    comment.comment = Some("<p>Looks good</p>".into());
    h.notifier.handle_event(&comment).await;

    h.notifier
        .handle_event(&event(WorkItemEventKind::Completed, "t1", "1"))
        .await;

    let posts = h.chat.posts();
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[1].thread_ts.as_deref(), Some(root_ts.as_str()));
    assert!(posts[1].text.contains("Looks good"));
    assert_eq!(posts[2].thread_ts.as_deref(), Some(root_ts.as_str()));
    assert!(posts[2].text.contains("completed"));
}

#[tokio::test]
async fn events_for_unseen_items_go_to_the_channel() {
    let h = Harness::new();
    h.directory_service.map_channel("1", "C-WEB");

    h.notifier
        .handle_event(&event(WorkItemEventKind::Completed, "old", "1"))
        .await;

    let posts = h.chat.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel, "C-WEB");
    assert!(posts[0].thread_ts.is_none());
}

#[tokio::test]
async fn assignment_change_dms_new_assignees() {
    let h = Harness::new();
    h.directory_service.map_channel("1", "C-WEB");

    h.notifier
        .handle_event(&event(WorkItemEventKind::AssigneesChanged, "t9", "1"))
        .await;

    assert_eq!(h.chat.dms().len(), 1);
    let posts = h.chat.posts();
    assert!(posts[0].text.contains("is now assigned to <@U-ADA>"));
}

#[tokio::test]
async fn unmapped_project_without_default_still_dms() {
    let h = Harness::new();

    h.notifier
        .handle_event(&event(WorkItemEventKind::Created, "t2", "99"))
        .await;

    assert!(h.chat.posts().is_empty());
    assert_eq!(h.chat.dms().len(), 1);
    assert!(h.notifier.threads().lookup("t2").await.is_none());
}

#[tokio::test]
async fn default_channel_catches_unmapped_projects() {
    let h = Harness::new();
    let notifier = NotificationDispatcher::new(
        h.chat.clone(),
        Arc::clone(&h.directory),
        Some("C-ALL".into()),
    );

    notifier
        .handle_event(&event(WorkItemEventKind::Created, "t3", "99"))
        .await;

    assert_eq!(h.chat.posts()[0].channel, "C-ALL");
    assert!(notifier.threads().lookup("t3").await.is_some());
}

#[tokio::test]
async fn failed_channel_post_does_not_stop_dms() {
    let h = Harness::new();
    h.directory_service.map_channel("1", "C-WEB");
    h.chat.fail_posts.store(true, Ordering::SeqCst);

    h.notifier
        .handle_event(&event(WorkItemEventKind::Created, "t4", "1"))
        .await;

    assert_eq!(h.chat.dms().len(), 1);
    assert!(h.notifier.threads().lookup("t4").await.is_none());
}

#[tokio::test]
async fn directory_outage_skips_mentions_but_not_the_post() {
    let h = Harness::new();
    h.directory_service.set_failing(true);
    let notifier = NotificationDispatcher::new(
        h.chat.clone(),
        Arc::clone(&h.directory),
        Some("C-ALL".into()),
    );

    notifier
        .handle_event(&event(WorkItemEventKind::Created, "t5", "1"))
        .await;

    let posts = h.chat.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].text.contains("Grace Hopper created"));
    assert!(h.chat.dms().is_empty());
}
