use std::sync::Arc;

use bookstore::book::fields;
use bookstore::seeder::reset_and_load;
use bookstore::{Book, Bookstore, BookstoreError, DocumentStore, MemoryStore, sample_books};
use bson::Bson;

async fn store_with(books: &[Book]) -> Bookstore<Arc<MemoryStore>> {
    let store = Arc::new(MemoryStore::new());
    reset_and_load(&store, books).await.unwrap();
    Bookstore::new(store)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[tokio::test]
async fn average_price_by_genre_sorted_descending() {
    let bs = store_with(&sample_books()).await;
    let rows = bs.group_average(fields::GENRE, fields::PRICE).await.unwrap();
    let expect = [
        ("Fantasy", 18.49, 2),
        ("Science Fiction", 16.99, 2),
        ("Mystery", 15.99, 1),
        ("Fiction", 14.49, 2),
        ("Dystopian", 14.49, 2),
        ("Classic", 12.99, 1),
    ];
    assert_eq!(rows.len(), expect.len());
    for w in rows.windows(2) {
        assert!(w[0].average >= w[1].average);
    }
    for (genre, avg, count) in expect {
        let row = rows.iter().find(|r| r.group == Bson::String(genre.into())).unwrap();
        assert!(close(row.average.unwrap(), avg), "{genre}: {:?}", row.average);
        assert_eq!(row.count, count);
    }
    assert_eq!(rows[0].group, Bson::String("Fantasy".into()));
}

#[tokio::test]
async fn average_of_missing_field_is_none() {
    let bs = store_with(&sample_books()).await;
    let rows = bs.group_average(fields::GENRE, "rating").await.unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| r.average.is_none()));
}

#[tokio::test]
async fn top_author_has_the_highest_count() {
    let mut books = sample_books();
    books.push(Book::new("The Silmarillion", "J.R.R. Tolkien", "Fantasy", 1977, 21.0, true, 365, "George Allen & Unwin"));
    let bs = store_with(&books).await;
    let top = bs.group_top(fields::AUTHOR).await.unwrap().unwrap();
    assert_eq!(top.group, Bson::String("J.R.R. Tolkien".into()));
    assert_eq!(top.count, 2);
}

#[tokio::test]
async fn top_of_empty_collection_is_none() {
    let bs = store_with(&[]).await;
    assert!(bs.group_top(fields::AUTHOR).await.unwrap().is_none());
    assert!(bs.group_average(fields::GENRE, fields::PRICE).await.unwrap().is_empty());
    assert!(bs.group_by_bucket(fields::PUBLISHED_YEAR, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn decades_are_ascending_and_complete() {
    let bs = store_with(&sample_books()).await;
    let rows = bs.group_by_bucket(fields::PUBLISHED_YEAR, 10).await.unwrap();
    let got: Vec<(i64, u64)> = rows.iter().map(|r| (r.bucket.unwrap(), r.count)).collect();
    assert_eq!(
        got,
        vec![(1920, 1), (1930, 1), (1940, 1), (1960, 2), (1980, 1), (1990, 1), (2000, 2), (2010, 1)]
    );
    assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), 10);
    let sixties = rows.iter().find(|r| r.bucket == Some(1960)).unwrap();
    assert_eq!(sixties.members, vec!["To Kill a Mockingbird".to_string(), "Dune".to_string()]);
    for r in &rows {
        assert_eq!(r.members.len() as u64, r.count);
    }
}

#[tokio::test]
async fn record_without_year_gets_a_keyless_bucket() {
    use bookstore::report::{Outcome, Section, Task, render_section};
    let store = Arc::new(MemoryStore::new());
    reset_and_load(&store, &sample_books()).await.unwrap();
    store.insert_many(vec![bson::doc! { "title": "No year" }]).await.unwrap();
    let bs = Bookstore::new(Arc::clone(&store));

    let rows = bs.group_by_bucket(fields::PUBLISHED_YEAR, 10).await.unwrap();
    assert_eq!(rows.len(), 9);
    assert_eq!(rows[0].bucket, None);
    assert_eq!(rows[0].members, vec!["No year".to_string()]);
    assert_eq!(rows[1].bucket, Some(1920));
    assert_eq!(rows.iter().map(|r| r.count).sum::<u64>(), 11);

    let section = Section {
        task: Task::Aggregation,
        title: "Books by publication decade".into(),
        outcome: Outcome::Buckets { rows },
    };
    assert!(render_section(&section).contains("- (none): 1 books\n- 1920s: 1 books"));
}

#[tokio::test]
async fn non_positive_bucket_width_is_rejected() {
    let bs = store_with(&sample_books()).await;
    for width in [0, -10] {
        let err = bs.group_by_bucket(fields::PUBLISHED_YEAR, width).await.unwrap_err();
        assert!(matches!(err, BookstoreError::Query(_)));
    }
}

// Returns group rows without a count, as a foreign pipeline might.
struct CountlessRows(MemoryStore);

#[async_trait::async_trait]
impl DocumentStore for CountlessRows {
    fn backend_name(&self) -> &'static str {
        "countless"
    }
    async fn ping(&self) -> bookstore::Result<()> {
        self.0.ping().await
    }
    async fn insert_many(&self, docs: Vec<bson::Document>) -> bookstore::Result<u64> {
        self.0.insert_many(docs).await
    }
    async fn find(
        &self,
        filter: &bookstore::query::Filter,
        opts: &bookstore::query::FindOptions,
    ) -> bookstore::Result<Vec<bson::Document>> {
        self.0.find(filter, opts).await
    }
    async fn count(&self, filter: &bookstore::query::Filter) -> bookstore::Result<u64> {
        self.0.count(filter).await
    }
    async fn update_one(
        &self,
        filter: &bookstore::query::Filter,
        update: &bookstore::query::UpdateDoc,
    ) -> bookstore::Result<bookstore::query::UpdateReport> {
        self.0.update_one(filter, update).await
    }
    async fn delete_one(
        &self,
        filter: &bookstore::query::Filter,
    ) -> bookstore::Result<bookstore::query::DeleteReport> {
        self.0.delete_one(filter).await
    }
    async fn delete_many(
        &self,
        filter: &bookstore::query::Filter,
    ) -> bookstore::Result<bookstore::query::DeleteReport> {
        self.0.delete_many(filter).await
    }
    async fn aggregate(
        &self,
        _pipeline: &[bookstore::query::Stage],
    ) -> bookstore::Result<Vec<bson::Document>> {
        Ok(vec![bson::doc! { "_id": "Fantasy", "average": 18.49 }])
    }
    async fn create_index(&self, spec: &bookstore::query::IndexSpec) -> bookstore::Result<String> {
        self.0.create_index(spec).await
    }
    async fn list_indexes(&self) -> bookstore::Result<Vec<bookstore::query::IndexDescriptor>> {
        self.0.list_indexes().await
    }
    async fn close(&self) -> bookstore::Result<()> {
        self.0.close().await
    }
}

#[tokio::test]
async fn malformed_aggregation_rows_are_query_errors() {
    let bs = Bookstore::new(CountlessRows(MemoryStore::new()));
    for err in [
        bs.group_average(fields::GENRE, fields::PRICE).await.unwrap_err(),
        bs.group_top(fields::AUTHOR).await.unwrap_err(),
        bs.group_by_bucket(fields::PUBLISHED_YEAR, 10).await.unwrap_err(),
    ] {
        assert!(matches!(err, BookstoreError::Query(ref m) if m.contains("without a count")), "{err}");
    }
}
