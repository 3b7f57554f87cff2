//! Memory store persistence across process restarts.

use autodev::io::memory::{MemoryStore, PATTERN_CAP};

#[test]
fn success_archive_keeps_most_recent_hundred() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut store = MemoryStore::open(temp.path()).expect("open");
    for i in 1..=101 {
        store
            .record_success(&format!("goal-{i}"), vec!["main.py".to_string()])
            .expect("record success");
    }

    let reopened = MemoryStore::open(temp.path()).expect("reopen");
    let goals: Vec<&str> = reopened
        .patterns()
        .successful_patterns
        .iter()
        .map(|p| p.goal.as_str())
        .collect();
    assert_eq!(goals.len(), PATTERN_CAP);
    assert_eq!(goals.first(), Some(&"goal-2"));
    assert_eq!(goals.last(), Some(&"goal-101"));
    assert_eq!(reopened.state().total_goals_completed, 101);
}

#[test]
fn inspect_reads_without_counting_a_boot() {
    let temp = tempfile::tempdir().expect("tempdir");
    {
        let mut store = MemoryStore::open(temp.path()).expect("open");
        store.record_action("operator_input", "ls", true).expect("record");
    }

    let peek = MemoryStore::inspect(temp.path());
    assert_eq!(peek.state().boot_count, 1);
    assert!(peek.context_summary().contains("  [OK] operator_input: ls"));

    let store = MemoryStore::open(temp.path()).expect("reopen");
    assert_eq!(store.state().boot_count, 2);
}

#[test]
fn inspect_of_missing_directory_is_empty() {
    let temp = tempfile::tempdir().expect("tempdir");
    let peek = MemoryStore::inspect(&temp.path().join("absent"));
    assert_eq!(peek.state().boot_count, 0);
    assert!(peek.projects().is_empty());
    assert!(!temp.path().join("absent").exists());
}
