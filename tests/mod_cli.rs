use bookstore::cli::{Command, run};
use bookstore::config::AppConfig;

#[tokio::test]
async fn memory_demo_prints_the_full_report() {
    let mut out = Vec::new();
    run(&AppConfig::default(), true, Command::Demo { json: false }, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("10 books were successfully inserted into the database\n"));
    assert!(text.contains("BOOKSTORE - DOCUMENT STORE QUERIES"));
    assert!(text.contains("Finding books in genre: Fantasy\nFound 2 books:"));
    assert!(text.contains("- 1920s: 1 books"));
    assert!(text.ends_with("ALL TASKS COMPLETED SUCCESSFULLY!\n"));
}

#[tokio::test]
async fn memory_queries_as_ndjson() {
    let mut out = Vec::new();
    run(&AppConfig::default(), true, Command::Queries { json: true }, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    let rows: Vec<serde_json::Value> =
        text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(rows.len(), 16);
    assert_eq!(rows[0]["kind"], "books");
    assert_eq!(rows[0]["task"], "basic_crud");
    assert_eq!(rows[15]["kind"], "indexes");
}

#[tokio::test]
async fn memory_seed_lists_inserted_books() {
    let mut out = Vec::new();
    run(&AppConfig::default(), true, Command::Seed, &mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("1. \"The Great Gatsby\" by F. Scott Fitzgerald (1925)"));
    assert_eq!(text.lines().count(), 11);
}

#[tokio::test]
async fn failed_demo_seed_closes_the_store_and_keeps_the_error() {
    use bookstore::cli::run_with_store;
    use bookstore::{BookstoreError, MemoryStore};
    use std::sync::Arc;

    let store = Arc::new(MemoryStore::new());
    store.reject_writes("disk full");
    let mut out = Vec::new();
    let err = run_with_store(store.clone(), false, Command::Demo { json: false }, &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, BookstoreError::Write(ref m) if m == "disk full"));
    assert!(store.is_closed());
    assert!(out.is_empty());
}
