//! Integration tests for confab-checkpoint
//!
//! Both stores are run through the same checks; the file store additionally
//! covers reopening, torn writes and unsafe thread ids.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use confab_checkpoint::{
    CheckpointError, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore,
};
use confab_provider::{Invocation, Message};
use serde_json::json;
use tempfile::TempDir;

fn tool_exchange() -> Vec<Message> {
    let call = Invocation::new("call_1", "p1_search", json!({"q": "x"}));
    vec![
        Message::user("find x"),
        Message::assistant_with_invocations("", vec![call.clone()]),
        Message::tool_result(&call, "found x"),
        Message::assistant("x is here"),
    ]
}

async fn check_round_trip(store: &dyn CheckpointStore) {
    let thread = store.new_thread_id().await.unwrap();
    assert!(store.load(&thread).await.unwrap().is_empty());

    let messages = tool_exchange();
    store.append(&thread, &messages[..2]).await.unwrap();
    store.append(&thread, &messages[2..]).await.unwrap();

    assert_eq!(store.load(&thread).await.unwrap(), messages);
}

async fn check_isolation(store: Arc<dyn CheckpointStore>) {
    let t1 = store.new_thread_id().await.unwrap();
    let t2 = store.new_thread_id().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        let (thread, tag) = if i % 2 == 0 {
            (t1.clone(), "one")
        } else {
            (t2.clone(), "two")
        };
        tasks.push(tokio::spawn(async move {
            store
                .append(&thread, &[Message::user(format!("{tag}-{i}"))])
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let h1 = store.load(&t1).await.unwrap();
    let h2 = store.load(&t2).await.unwrap();
    assert_eq!(h1.len(), 10);
    assert_eq!(h2.len(), 10);
    assert!(h1.iter().all(|m| m.text().starts_with("one-")));
    assert!(h2.iter().all(|m| m.text().starts_with("two-")));
}

#[tokio::test]
async fn test_memory_store_round_trip() {
    check_round_trip(&MemoryCheckpointStore::new()).await;
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    check_round_trip(&FileCheckpointStore::new(dir.path()).unwrap()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_store_threads_are_isolated() {
    check_isolation(Arc::new(MemoryCheckpointStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_threads_are_isolated() {
    let dir = TempDir::new().unwrap();
    check_isolation(Arc::new(FileCheckpointStore::new(dir.path()).unwrap())).await;
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let thread = {
        let store = FileCheckpointStore::new(dir.path()).unwrap();
        let thread = store.new_thread_id().await.unwrap();
        store.append(&thread, &tool_exchange()).await.unwrap();
        thread
    };

    let reopened = FileCheckpointStore::new(dir.path()).unwrap();
    assert_eq!(reopened.load(&thread).await.unwrap(), tool_exchange());
    assert_eq!(reopened.list_threads().await.unwrap(), vec![thread.clone()]);

    let records = reopened.records(&thread).await.unwrap();
    assert!(records
        .windows(2)
        .all(|w| w[0].recorded_at <= w[1].recorded_at));
}

#[tokio::test]
async fn test_file_store_ignores_torn_trailing_line() {
    let dir = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(dir.path()).unwrap();
    store
        .append("t1", &[Message::user("hello"), Message::assistant("hi")])
        .await
        .unwrap();

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("t1.jsonl"))
        .unwrap();
    file.write_all(br#"{"recorded_at":"2024-01-01T00:00:00Z","message":{"role":"us"#)
        .unwrap();

    let history = store.load("t1").await.unwrap();
    assert_eq!(history, vec![Message::user("hello"), Message::assistant("hi")]);
}

#[tokio::test]
async fn test_file_store_appends_cleanly_after_torn_line() {
    let dir = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(dir.path()).unwrap();
    store
        .append("t1", &[Message::user("hello"), Message::assistant("hi")])
        .await
        .unwrap();

    let path = dir.path().join("t1.jsonl");
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(br#"{"recorded_at":"2024-01-01T00:00:00Z","message":{"role":"us"#)
        .unwrap();
    drop(file);

    store.append("t1", &[Message::user("again")]).await.unwrap();
    store.append("t1", &[Message::assistant("welcome back")]).await.unwrap();

    assert_eq!(
        store.load("t1").await.unwrap(),
        vec![
            Message::user("hello"),
            Message::assistant("hi"),
            Message::user("again"),
            Message::assistant("welcome back"),
        ]
    );
    let raw = std::fs::read_to_string(&path).unwrap();
    assert_eq!(raw.lines().count(), 4);
    assert!(raw.ends_with('\n'));

    // a reopened store reads the repaired log too
    let reopened = FileCheckpointStore::new(dir.path()).unwrap();
    assert_eq!(reopened.load("t1").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_file_store_torn_first_line_is_replaced() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("t1.jsonl"), r#"{"recorded_at":"2024"#).unwrap();
    let store = FileCheckpointStore::new(dir.path()).unwrap();
    assert!(store.load("t1").await.unwrap().is_empty());

    store.append("t1", &[Message::user("first")]).await.unwrap();
    assert_eq!(store.load("t1").await.unwrap(), vec![Message::user("first")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_store_releases_writer_locks() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileCheckpointStore::new(dir.path()).unwrap());

    let mut tasks = Vec::new();
    for i in 0..30 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store
                .append(&format!("t{}", i % 5), &[Message::user(format!("m{i}"))])
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.busy_threads(), 0);
    assert_eq!(store.list_threads().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_file_store_rejects_corrupt_middle_line() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("t1.jsonl"),
        "not json\n{\"recorded_at\":\"2024-01-01T00:00:00Z\",\"message\":{\"role\":\"user\",\"text\":\"x\"}}\n",
    )
    .unwrap();
    let store = FileCheckpointStore::new(dir.path()).unwrap();
    assert!(matches!(
        store.load("t1").await,
        Err(CheckpointError::Json(_))
    ));
}

#[tokio::test]
async fn test_file_store_rejects_unsafe_thread_ids() {
    let dir = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(dir.path().join("threads")).unwrap();

    for bad in ["../escape", "a/b", "", "x\ny"] {
        let err = store
            .append(bad, &[Message::user("x")])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidThreadId(_)), "{bad:?}");
    }
    assert!(!dir.path().join("escape.jsonl").exists());
}

#[tokio::test]
async fn test_new_thread_ids_never_repeat() {
    let dir = TempDir::new().unwrap();
    let file = FileCheckpointStore::new(dir.path()).unwrap();
    let memory = MemoryCheckpointStore::new();

    let mut seen = HashSet::new();
    for _ in 0..50 {
        assert!(seen.insert(file.new_thread_id().await.unwrap()));
        assert!(seen.insert(memory.new_thread_id().await.unwrap()));
    }
    assert_eq!(file.list_threads().await.unwrap().len(), 50);
}
