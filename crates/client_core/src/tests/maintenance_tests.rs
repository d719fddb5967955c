use serde_json::json;
use shared::domain::TaskId;
use storage::Fields;

use super::*;
use crate::{
    repositories::{CategoryRepository, TaskRepository},
    test_support::*,
};

fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn maintenance() -> (Maintenance, ClientContext) {
    let (storage, ctx) = memory_context("u1").await;
    let maintenance = Maintenance::new(storage, UserId::new("u1")).expect("maintenance");
    (maintenance, ctx)
}

#[tokio::test]
async fn user_ids_that_would_break_paths_are_rejected() {
    for uid in ["a/b", ""] {
        let err = Maintenance::new(memory_storage().await, UserId::new(uid))
            .err()
            .expect("invalid uid");
        assert!(matches!(err, PlannerError::Domain(_)));
    }
}

#[tokio::test]
async fn flat_categories_move_into_a_new_list() {
    let (maintenance, ctx) = maintenance().await;
    let uid = ctx.uid().clone();
    let store = ctx.store();
    let category = CategoryId::new("school");
    store
        .set(
            &paths::legacy_categories(&uid).doc(&category),
            fields(json!({"name": "School", "order": 0})),
            SetMode::Overwrite,
        )
        .await
        .expect("seed category");
    store
        .set(
            &paths::legacy_tasks(&uid, &category).doc("t1"),
            fields(json!({
                "text": "Essay",
                "order": 0,
                "isComplete": false,
                "dueDate": "2025-03-10T00:00:00+09:00",
                "subtasks": [{"text": "Outline", "isComplete": true}]
            })),
            SetMode::Overwrite,
        )
        .await
        .expect("seed task");

    let report = maintenance
        .migrate_flat_categories("My Tasks")
        .await
        .expect("migrate");
    assert_eq!((report.categories, report.tasks), (1, 1));
    let list_id = report.list_id.expect("target list");

    let categories = CategoryRepository::new(&ctx, &list_id).all().await.expect("all");
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "School");
    let task = TaskRepository::new(&ctx, &list_id, &category)
        .get(&TaskId::new("t1"))
        .await
        .expect("migrated task");
    assert_eq!(
        task.due_date.map(shared::dates::format_calendar_date).as_deref(),
        Some("2025-03-10")
    );
    assert_eq!(task.subtasks[0].id.as_str(), "legacy-0");

    let leftover = store
        .query(&Query::collection(paths::legacy_categories(&uid)))
        .await
        .expect("query");
    assert!(leftover.is_empty());

    let again = maintenance
        .migrate_flat_categories("My Tasks")
        .await
        .expect("rerun");
    assert_eq!(again, MigrationReport::default());
}

#[tokio::test]
async fn audit_finds_collisions_and_repair_densifies() {
    let (maintenance, ctx) = maintenance().await;
    let lists = paths::lists(ctx.uid());
    for (id, order) in [("a", 0), ("b", 0), ("c", 5)] {
        ctx.store()
            .set(
                &lists.doc(id),
                fields(json!({"name": id, "order": order})),
                SetMode::Overwrite,
            )
            .await
            .expect("seed");
    }

    let audits = maintenance.audit_order().await.expect("audit");
    let lists_audit = audits
        .iter()
        .find(|scope| scope.collection == lists)
        .expect("lists scope");
    assert_eq!(lists_audit.audit.duplicates, vec![0]);
    assert_eq!(lists_audit.ids, vec!["a", "b", "c"]);

    let repaired = maintenance.repair_order().await.expect("repair");
    assert_eq!(repaired, vec![lists.clone()]);
    let orders: Vec<(String, u32)> = crate::ListRepository::new(&ctx)
        .all()
        .await
        .expect("all")
        .into_iter()
        .map(|l| (l.name, l.order))
        .collect();
    assert_eq!(
        orders,
        vec![("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 2)]
    );
    assert!(maintenance.repair_order().await.expect("repair").is_empty());
}

#[tokio::test]
async fn orphans_under_deleted_parents_are_reported_and_purged() {
    let (maintenance, ctx) = maintenance().await;
    let lists = crate::ListRepository::new(&ctx);
    let doomed = lists.create("Old").await.expect("list");
    lists.create("Keep").await.expect("list");
    let category = CategoryRepository::new(&ctx, &doomed.id)
        .create("Math")
        .await
        .expect("category");
    TaskRepository::new(&ctx, &doomed.id, &category.id)
        .create("Homework", None)
        .await
        .expect("task");
    lists.delete(&doomed.id).await.expect("delete");

    let orphans = maintenance.find_orphans().await.expect("orphans");
    assert_eq!(orphans.len(), 2);
    assert!(orphans
        .iter()
        .all(|o| o.missing_parent == paths::lists(ctx.uid()).doc(&doomed.id)));

    assert_eq!(maintenance.purge_orphans().await.expect("purge"), 2);
    assert!(maintenance.find_orphans().await.expect("orphans").is_empty());
    assert_eq!(lists.all().await.expect("all").len(), 1);
}

#[tokio::test]
async fn dump_includes_the_user_document() {
    let (maintenance, ctx) = maintenance().await;
    crate::ProfileRepository::new(&ctx, "My To-Do List")
        .set_title("Chores")
        .await
        .expect("title");
    crate::ListRepository::new(&ctx)
        .create("Home")
        .await
        .expect("list");

    let documents = maintenance.dump().await.expect("dump");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].path, paths::user_doc(ctx.uid()));
}
