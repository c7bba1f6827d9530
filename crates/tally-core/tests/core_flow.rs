use chrono::{Duration, Utc};
use tally_core::store::{TaskStore, ValidationError};
use tally_core::task::{Priority, TaskId};
use tally_core::view::{CategoryFilter, FilterState, StatusFilter};
use tempfile::tempdir;

#[test]
fn added_task_survives_a_reopen() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();

    let added = {
        let mut store = TaskStore::open(temp.path()).expect("open store");
        store
            .add("buy groceries", "home", "high", Some(now + Duration::days(1)), now)
            .expect("add task")
    };

    let store = TaskStore::open(temp.path()).expect("reopen store");
    let last = store.tasks().last().expect("one task");
    assert_eq!(last.id, added.id);
    assert_eq!(last.text, "buy groceries");
    assert_eq!(last.priority, Priority::High);
    assert!(!last.done);
}

#[test]
fn two_char_text_fails_and_leaves_collection_unchanged() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");

    let err = store
        .add("ab", "home", "normal", None, Utc::now())
        .expect_err("validation must fail");
    assert!(err.downcast_ref::<ValidationError>().is_some());
    assert!(store.tasks().is_empty());

    // Nothing was persisted either.
    let reopened = TaskStore::open(temp.path()).expect("reopen store");
    assert!(reopened.tasks().is_empty());
}

#[test]
fn toggling_twice_restores_the_original_flag() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    let task = store.add("write report", "work", "normal", None, now).expect("add");
    assert!(store.toggle_done(task.id).expect("toggle"));
    assert!(store.tasks()[0].done);
    assert!(store.toggle_done(task.id).expect("toggle back"));
    assert!(!store.tasks()[0].done);
    assert_eq!(store.tasks().len(), 1);
}

#[test]
fn unknown_ids_are_silent_noops() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    store.add("only task", "work", "normal", None, now).expect("add");
    let ghost = TaskId::new();

    assert!(!store.toggle_done(ghost).expect("toggle"));
    assert!(!store.delete(ghost).expect("delete"));
    assert!(!store.move_before(ghost, store.tasks()[0].id).expect("move"));
    assert_eq!(store.tasks().len(), 1);
}

#[test]
fn delete_removes_exactly_one_and_is_idempotent() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    let a = store.add("task alpha", "work", "normal", None, now).expect("add");
    store.add("task beta", "work", "normal", None, now).expect("add");

    assert!(store.delete(a.id).expect("delete"));
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.tasks()[0].text, "task beta");

    assert!(!store.delete(a.id).expect("second delete"));
    assert_eq!(store.tasks().len(), 1);
}

#[test]
fn move_before_places_source_immediately_before_target() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    let a = store.add("task a", "work", "normal", None, now).expect("add");
    let b = store.add("task b", "work", "normal", None, now).expect("add");
    let c = store.add("task c", "work", "normal", None, now).expect("add");

    assert!(store.move_before(c.id, a.id).expect("move"));

    let order: Vec<TaskId> = store.tasks().iter().map(|t| t.id).collect();
    assert_eq!(order, vec![c.id, a.id, b.id]);

    // Moving downward: a ends up immediately before c's old neighbour b.
    assert!(store.move_before(c.id, b.id).expect("move"));
    let order: Vec<TaskId> = store.tasks().iter().map(|t| t.id).collect();
    assert_eq!(order, vec![a.id, c.id, b.id]);

    assert!(!store.move_before(a.id, a.id).expect("self move"));
    assert_eq!(store.tasks().len(), 3);
}

#[test]
fn filtered_views_keep_collection_order() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    let a = store.add("task a", "home", "normal", None, now).expect("add");
    let b = store.add("task b", "work", "normal", None, now).expect("add");
    let c = store.add("task c", "work", "normal", None, now).expect("add");
    store.toggle_done(b.id).expect("complete b");

    let active = FilterState {
        status: StatusFilter::Active,
        ..Default::default()
    };
    let view: Vec<TaskId> = active.visible(store.tasks()).iter().map(|t| t.id).collect();
    assert_eq!(view, vec![a.id, c.id]);

    let active_work = FilterState {
        status: StatusFilter::Active,
        category: CategoryFilter::Only("work".to_string()),
        ..Default::default()
    };
    let view: Vec<TaskId> = active_work
        .visible(store.tasks())
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(view, vec![c.id]);

    let no_match = FilterState {
        search: "xyz".to_string(),
        ..Default::default()
    };
    assert!(no_match.visible(store.tasks()).is_empty());
}

#[test]
fn clear_all_empties_and_persists() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(temp.path()).expect("open store");
    let now = Utc::now();

    store.add("task one", "work", "normal", None, now).expect("add");
    store.add("task two", "home", "normal", None, now).expect("add");

    store.clear_all().expect("clear");
    assert!(store.tasks().is_empty());

    let reopened = TaskStore::open(temp.path()).expect("reopen store");
    assert!(reopened.tasks().is_empty());
}
