use std::sync::Arc;

use serde_json::json;
use shared::{domain::CategoryId, paths};

use super::*;
use crate::{alerts::RecordingAlertSink, test_support::*};

async fn settle(board: &mut BoardController, done: impl Fn(&BoardState) -> bool) {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !done(board.state()) {
            assert!(board.process_next().await, "message channel closed");
        }
    })
    .await
    .expect("board settled in time");
}

fn controller(ctx: ClientContext, alerts: Arc<RecordingAlertSink>) -> BoardController {
    BoardController::new(ctx, alerts, "My Tasks", "My To-Do List")
}

async fn started_with_default_list(
    ctx: ClientContext,
    alerts: Arc<RecordingAlertSink>,
) -> BoardController {
    let mut board = controller(ctx, alerts);
    board.start().await;
    settle(&mut board, |s| s.active_list().is_some()).await;
    board
}

#[tokio::test]
async fn first_sign_in_creates_and_selects_the_default_list() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx.clone(), alerts.clone()).await;

    let active = board.state().active_list().expect("active").clone();
    assert_eq!(active.name, "My Tasks");
    assert_eq!(board.title(), "My To-Do List");

    // The snapshot echoing the creation must not create a second list.
    settle(&mut board, |s| s.lists.len() == 1 && s.lists_loaded).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    board.process_pending().await;
    assert_eq!(ListRepository::new(&ctx).all().await.expect("all").len(), 1);
    assert!(alerts.messages().is_empty());
}

#[tokio::test]
async fn deleting_the_only_list_alerts_and_keeps_it() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx.clone(), alerts.clone()).await;

    assert!(!board.delete_active_list().await);
    assert_eq!(alerts.messages(), vec!["Cannot delete your only list!".to_string()]);
    assert!(board.state().active_list().is_some());
    assert_eq!(ListRepository::new(&ctx).all().await.expect("all").len(), 1);
}

#[tokio::test]
async fn deleting_the_active_list_moves_to_another() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx, alerts).await;
    let first = board.state().active_list.clone().expect("active");

    let second = board.create_list("Work").await.expect("created");
    assert_eq!(board.state().active_list.as_ref(), Some(&second));
    assert!(board.is_watching(&BoardWatch::Categories(second.clone())));
    assert!(!board.is_watching(&BoardWatch::Categories(first.clone())));

    assert!(board.delete_active_list().await);
    assert_eq!(board.state().active_list.as_ref(), Some(&first));
}

#[tokio::test]
async fn categories_and_tasks_flow_through_their_watches() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx, alerts.clone()).await;

    let math = board.add_category("Math").await.expect("category");
    assert!(board.is_watching(&BoardWatch::Tasks(
        board.state().active_list.clone().expect("active"),
        math.clone()
    )));
    assert!(!board.state().is_expanded(&math));
    board.toggle_category(&math).await;
    assert!(board.state().is_expanded(&math));

    let task = board
        .add_task(&math, "Homework", "2025-03-10")
        .await
        .expect("task");
    assert!(board.add_subtask(&math, &task, "Question 1").await);
    assert!(board.add_subtask(&math, &task, "Question 2").await);
    assert!(board.set_task_complete(&math, &task, true).await);

    let seen = board.state().task(&math, &task).expect("task").clone();
    assert!(seen.is_complete);
    assert_eq!(seen.subtasks.len(), 2);
    assert!(seen.subtasks.iter().all(|s| s.is_complete));

    // The store's own snapshot agrees with the local echo.
    settle(&mut board, |s| {
        s.task(&math, &task)
            .is_some_and(|t| t.is_complete && t.subtasks.len() == 2)
    })
    .await;
    assert!(alerts.messages().is_empty());
}

#[tokio::test]
async fn blank_input_and_bad_due_dates_write_nothing() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx.clone(), alerts.clone()).await;
    let list_id = board.state().active_list.clone().expect("active");

    assert!(board.add_category("   ").await.is_none());
    assert!(CategoryRepository::new(&ctx, &list_id)
        .all()
        .await
        .expect("all")
        .is_empty());

    let math = board.add_category("Math").await.expect("category");
    assert!(board.add_task(&math, "", "").await.is_none());
    assert!(alerts.messages().is_empty());

    assert!(board.add_task(&math, "Homework", "2025-02-30").await.is_none());
    assert_eq!(alerts.messages().len(), 1);
    assert!(TaskRepository::new(&ctx, &list_id, &math)
        .all()
        .await
        .expect("all")
        .is_empty());
}

#[tokio::test]
async fn move_category_reindexes_the_scope() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx.clone(), alerts).await;
    let list_id = board.state().active_list.clone().expect("active");
    board.add_category("Math").await.expect("math");
    board.add_category("Science").await.expect("science");

    assert!(board.move_category(1, 0).await);
    let local: Vec<&str> = board
        .state()
        .categories
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(local, vec!["Science", "Math"]);

    let stored: Vec<(String, u32)> = CategoryRepository::new(&ctx, &list_id)
        .all()
        .await
        .expect("all")
        .into_iter()
        .map(|c| (c.name, c.order))
        .collect();
    assert_eq!(stored, vec![("Science".to_string(), 0), ("Math".to_string(), 1)]);
    assert!(!board.move_category(5, 0).await);
}

#[tokio::test]
async fn saving_a_task_draft_writes_once_and_closes_it() {
    let (_, ctx) = memory_context("u1").await;
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx.clone(), alerts).await;
    let list_id = board.state().active_list.clone().expect("active");
    let math = board.add_category("Math").await.expect("math");
    let task = board.add_task(&math, "Homework", "").await.expect("task");

    board.open_edit_task(&math, &task).await;
    board
        .edit_draft(|draft| {
            if let BoardDraft::EditTask { text, due, .. } = draft {
                *text = "Homework ch. 3".into();
                *due = "2025-03-10".into();
            }
        })
        .await;
    // Nothing is written before save.
    let stored = TaskRepository::new(&ctx, &list_id, &math)
        .get(&task)
        .await
        .expect("get");
    assert_eq!(stored.text, "Homework");

    assert!(board.save_draft().await);
    assert!(board.state().draft.is_none());
    let stored = TaskRepository::new(&ctx, &list_id, &math)
        .get(&task)
        .await
        .expect("get");
    assert_eq!(stored.text, "Homework ch. 3");
    assert_eq!(
        stored.due_date.map(shared::dates::format_calendar_date).as_deref(),
        Some("2025-03-10")
    );
}

#[tokio::test]
async fn failed_write_alerts_once_and_leaves_state_alone() {
    let storage = memory_storage().await;
    let store = FlakyStore::new(storage);
    let ctx = ClientContext::new(store.clone(), identity("u1"));
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = started_with_default_list(ctx, alerts.clone()).await;
    let math = board.add_category("Math").await.expect("math");
    let before = board.state().clone();

    store.fail_writes(true);
    assert!(!board.rename_category(&math, "Algebra").await);
    assert!(board.add_task(&math, "Homework", "").await.is_none());

    assert_eq!(
        alerts.messages(),
        vec![
            "Failed to rename category".to_string(),
            "Failed to add task".to_string()
        ]
    );
    assert_eq!(board.state(), &before);
}

#[tokio::test]
async fn scripted_snapshots_drive_the_board_without_a_backend() {
    let store = Arc::new(ScriptedStore::default());
    let ctx = ClientContext::new(store.clone(), identity("u1"));
    let alerts = Arc::new(RecordingAlertSink::default());
    let mut board = controller(ctx.clone(), alerts);
    board.start().await;

    let lists = paths::lists(ctx.uid());
    store
        .push(
            &lists,
            vec![
                document(&lists, "b", json!({"name": "Work", "order": 1})),
                document(&lists, "a", json!({"name": "Home", "order": 0})),
            ],
        )
        .await;
    settle(&mut board, |s| s.lists.len() == 2).await;
    // Snapshot order is what the store delivered.
    assert_eq!(board.state().active_list, Some(ListId::new("b")));

    let categories = paths::categories(ctx.uid(), &ListId::new("b"));
    store
        .push(
            &categories,
            vec![document(&categories, "c1", json!({"name": "Math", "order": 0}))],
        )
        .await;
    settle(&mut board, |s| s.categories.len() == 1).await;
    assert!(board.is_watching(&BoardWatch::Tasks(ListId::new("b"), CategoryId::new("c1"))));

    board.select_list(&ListId::new("a")).await;
    assert!(!board.is_watching(&BoardWatch::Categories(ListId::new("b"))));
    assert!(board.state().categories.is_empty());
}
