//! Integration tests for the access history as observed through the store.

mod common;

use common::TestEnv;
use planboard::{Status, WorkItem};

#[test]
fn test_history_starts_empty() {
    let env = TestEnv::new();
    assert!(env.store.history().is_empty());
}

#[test]
fn test_lookups_record_in_access_order() {
    let mut env = TestEnv::new();
    let t = env.add_task("t");
    let e = env.add_epic("e");
    let s = env.add_subtask(e, "s", Status::New);

    env.store.get_epic_by_id(e).unwrap();
    env.store.get_task_by_id(t).unwrap();
    env.store.get_subtask_by_id(s).unwrap();

    assert_eq!(env.history_ids(), vec![e, t, s]);
}

#[test]
fn test_reaccess_deduplicates() {
    let mut env = TestEnv::new();
    let five = env.add_task("five");
    let _ = env.add_task("six");
    let seven = env.add_task("seven");

    env.store.get_task_by_id(five).unwrap();
    env.store.get_task_by_id(seven).unwrap();
    env.store.get_task_by_id(five).unwrap();

    assert_eq!(env.history_ids(), vec![seven, five]);
}

#[test]
fn test_failed_lookup_records_nothing() {
    let mut env = TestEnv::new();
    let t = env.add_task("t");
    env.store.get_task_by_id(t).unwrap();

    assert!(env.store.get_task_by_id(999).is_err());
    assert!(env.store.get_epic_by_id(t).is_err()); // wrong kind

    assert_eq!(env.history_ids(), vec![t]);
}

#[test]
fn test_listings_do_not_touch_history() {
    let mut env = TestEnv::new();
    env.add_task("t");
    let e = env.add_epic("e");
    env.add_subtask(e, "s", Status::New);

    env.store.tasks();
    env.store.epics();
    env.store.subtasks();
    env.store.prioritized();

    assert!(env.store.history().is_empty());
}

#[test]
fn test_history_resolves_full_records() {
    let mut env = TestEnv::new();
    let e = env.add_epic("release");
    env.store.get_epic_by_id(e).unwrap();

    let history = env.store.history();
    assert_eq!(history.len(), 1);
    match &history[0] {
        WorkItem::Epic(epic) => assert_eq!(epic.name, "release"),
        other => panic!("expected epic in history, got {:?}", other),
    }
}

#[test]
fn test_deletion_purges_history() {
    let mut env = TestEnv::new();
    let a = env.add_task("a");
    let b = env.add_task("b");
    env.store.get_task_by_id(a).unwrap();
    env.store.get_task_by_id(b).unwrap();

    env.store.delete_task_by_id(a).unwrap();
    assert_eq!(env.history_ids(), vec![b]);
}

#[test]
fn test_history_snapshot_is_stable() {
    let mut env = TestEnv::new();
    let a = env.add_task("a");
    let b = env.add_task("b");
    env.store.get_task_by_id(a).unwrap();

    let before = env.store.history();
    env.store.get_task_by_id(b).unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(env.store.history().len(), 2);
}
