use bookstore::book::fields;
use bookstore::query::{Filter, FindOptions};
use bookstore::seeder::reset_and_load;
use bookstore::{Book, BookstoreError, DocumentStore, MemoryStore, sample_books};

#[tokio::test]
async fn seeding_twice_leaves_exactly_one_copy() {
    let store = MemoryStore::new();
    assert_eq!(reset_and_load(&store, &sample_books()).await.unwrap(), 10);
    assert_eq!(reset_and_load(&store, &sample_books()).await.unwrap(), 10);
    assert_eq!(store.len(), 10);
    assert_eq!(store.count(&Filter::eq(fields::TITLE, "Dune")).await.unwrap(), 1);
}

#[tokio::test]
async fn seeded_records_keep_their_field_types() {
    let store = MemoryStore::new();
    reset_and_load(&store, &sample_books()).await.unwrap();
    let docs = store.find(&Filter::eq(fields::TITLE, "The Martian"), &FindOptions::default()).await.unwrap();
    let b = Book::from_document(&docs[0]).unwrap();
    assert!(b.id.is_some());
    assert_eq!(b.published_year, 2011);
    assert_eq!(b.pages, 369);
    assert!(b.in_stock);
    assert_eq!(b.publisher, "Crown");
}

#[tokio::test]
async fn empty_batch_clears_the_collection() {
    let store = MemoryStore::new();
    reset_and_load(&store, &sample_books()).await.unwrap();
    assert_eq!(reset_and_load(&store, &[]).await.unwrap(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn invalid_record_aborts_before_any_write() {
    let store = MemoryStore::new();
    reset_and_load(&store, &sample_books()).await.unwrap();
    let mut books = sample_books();
    books[3].pages = 0;
    let err = reset_and_load(&store, &books).await.unwrap_err();
    assert!(matches!(err, BookstoreError::InvalidRecord { index: 3, .. }));
    // previous contents untouched
    assert_eq!(store.len(), 10);
}

#[tokio::test]
async fn rejected_writes_surface_as_write_errors() {
    let store = MemoryStore::new();
    store.reject_writes("not primary");
    let err = reset_and_load(&store, &sample_books()).await.unwrap_err();
    assert!(matches!(err, BookstoreError::Write(ref m) if m == "not primary"));
    store.accept_writes();
    assert_eq!(reset_and_load(&store, &sample_books()).await.unwrap(), 10);
}

#[tokio::test]
async fn closed_store_is_a_connection_error() {
    let store = MemoryStore::new();
    store.close().await.unwrap();
    let err = reset_and_load(&store, &sample_books()).await.unwrap_err();
    assert!(err.is_connection());
}
