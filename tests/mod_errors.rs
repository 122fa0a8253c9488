use bookstore::BookstoreError;

#[test]
fn messages_name_the_failure_kind() {
    assert_eq!(BookstoreError::Connection("timed out".into()).to_string(), "Connection error: timed out");
    assert_eq!(BookstoreError::Write("duplicate key".into()).to_string(), "Write error: duplicate key");
    assert_eq!(BookstoreError::Query("bad field".into()).to_string(), "Query error: bad field");
    assert_eq!(
        BookstoreError::InvalidRecord { index: 2, reason: "pages must be positive".into() }.to_string(),
        "Invalid record at position 2: pages must be positive"
    );
}

#[test]
fn io_and_json_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let e: BookstoreError = io.into();
    assert!(matches!(e, BookstoreError::Io(ref m) if m.contains("gone")));

    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let e: BookstoreError = json.into();
    assert!(e.to_string().starts_with("I/O error: json:"));
    assert!(!e.is_connection());
}
