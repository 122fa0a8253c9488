//! Typed query and aggregation operations over the `books` collection.
//!
//! [`Bookstore`] owns the store handle for its whole lifetime. Every method
//! returns data only; formatting lives in [`crate::report`].

use bson::Bson;

use crate::book::{Book, PartialBook, fields};
use crate::errors::{BookstoreError, Result};
use crate::query::{
    Accumulator, Bucket, Expr, Filter, FindOptions, GroupAverage, GroupCount, IndexDescriptor,
    IndexSpec, Order, SortSpec, Stage, UpdateDoc, out,
};
use crate::report::{DemoReport, LineStyle, Outcome, Task};
use crate::store::DocumentStore;

pub struct Bookstore<S: DocumentStore> {
    store: Option<S>,
}

fn logged<T>(op: &str, r: Result<T>) -> Result<T> {
    r.inspect_err(|e| log::error!("{op} failed: {e}"))
}

fn decode_books(docs: &[bson::Document]) -> Result<Vec<Book>> {
    docs.iter().map(Book::from_document).collect()
}

impl<S: DocumentStore> Bookstore<S> {
    /// Wraps an already connected store.
    pub fn new(store: S) -> Self {
        Self { store: Some(store) }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&S> {
        self.store.as_ref().ok_or_else(BookstoreError::not_connected)
    }

    /// Releases the store. Further operations fail with `Connection`.
    ///
    /// # Errors
    /// Whatever the store reports while shutting down.
    pub async fn close(&mut self) -> Result<()> {
        match self.store.take() {
            Some(store) => {
                let r = store.close().await;
                log::info!("disconnected from {} store", store.backend_name());
                r
            }
            None => Ok(()),
        }
    }

    async fn find_books(&self, op: &str, filter: &Filter, opts: &FindOptions) -> Result<Vec<Book>> {
        log::debug!("{op}: filter={filter:?} opts={opts:?}");
        let r = async { decode_books(&self.store()?.find(filter, opts).await?) }.await;
        logged(op, r)
    }

    /// Records whose `field` equals `value`.
    ///
    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn find_by_field(&self, field: &str, value: impl Into<Bson>) -> Result<Vec<Book>> {
        self.find_books("find_by_field", &Filter::eq(field, value), &FindOptions::default()).await
    }

    /// Records whose `field` is strictly greater than `threshold`.
    ///
    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn find_by_range_after(
        &self,
        field: &str,
        threshold: impl Into<Bson>,
    ) -> Result<Vec<Book>> {
        self.find_books("find_by_range_after", &Filter::gt(field, threshold), &FindOptions::default())
            .await
    }

    /// Records matching an arbitrary filter.
    ///
    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn find_where(&self, filter: &Filter) -> Result<Vec<Book>> {
        self.find_books("find_where", filter, &FindOptions::default()).await
    }

    /// First record whose `field` equals `value`.
    ///
    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn find_one(&self, field: &str, value: impl Into<Bson>) -> Result<Option<Book>> {
        let opts = FindOptions { limit: Some(1), ..FindOptions::default() };
        let books = self.find_books("find_one", &Filter::eq(field, value), &opts).await?;
        Ok(books.into_iter().next())
    }

    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        let r = async { self.store()?.count(filter).await }.await;
        logged("count", r)
    }

    /// Sets `field` to `new_value` on the first record whose `match_field`
    /// equals `match_value`. Returns the modified count: 0 when nothing
    /// matched or the value was already equal.
    ///
    /// # Errors
    /// `Connection` when closed; `Write` when the store rejects the update.
    pub async fn update_field(
        &self,
        match_field: &str,
        match_value: impl Into<Bson>,
        field: &str,
        new_value: impl Into<Bson>,
    ) -> Result<u64> {
        let filter = Filter::eq(match_field, match_value);
        let update = UpdateDoc::set(field, new_value);
        let r = async { self.store()?.update_one(&filter, &update).await }.await;
        let report = logged("update_field", r)?;
        log::info!(
            "update_field {filter:?}: matched={} modified={}",
            report.matched,
            report.modified
        );
        Ok(report.modified)
    }

    /// Deletes the first record whose `field` equals `value`.
    ///
    /// # Errors
    /// `Connection` when closed; `Write` when the store rejects the delete.
    pub async fn delete_by_field(&self, field: &str, value: impl Into<Bson>) -> Result<u64> {
        let filter = Filter::eq(field, value);
        let r = async { self.store()?.delete_one(&filter).await }.await;
        let report = logged("delete_by_field", r)?;
        log::info!("delete_by_field {filter:?}: deleted={}", report.deleted);
        Ok(report.deleted)
    }

    /// All records restricted to `included` fields; `_id` is never returned.
    ///
    /// # Errors
    /// `Query` for an empty field list; `Connection` when closed.
    pub async fn find_with_projection(&self, included: &[&str]) -> Result<Vec<PartialBook>> {
        if included.is_empty() {
            return logged(
                "find_with_projection",
                Err(BookstoreError::Query("projection needs at least one field".into())),
            );
        }
        let opts = FindOptions {
            projection: Some(included.iter().map(|f| (*f).to_string()).collect()),
            ..FindOptions::default()
        };
        let r = async { self.store()?.find(&Filter::True, &opts).await }.await;
        let docs = logged("find_with_projection", r)?;
        Ok(docs.iter().map(PartialBook::from_document).collect())
    }

    /// All records ordered by `field`.
    ///
    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn find_sorted(&self, field: &str, order: Order) -> Result<Vec<Book>> {
        let opts = FindOptions {
            sort: Some(vec![SortSpec { field: field.to_string(), order }]),
            ..FindOptions::default()
        };
        self.find_books("find_sorted", &Filter::True, &opts).await
    }

    /// One page of records, 1-based, in `_id` order so pages never overlap.
    ///
    /// # Errors
    /// `Query` when `page` or `size` is zero; `Connection` when closed.
    pub async fn find_page(&self, page: u64, size: u64) -> Result<Vec<Book>> {
        if page == 0 || size == 0 {
            return logged(
                "find_page",
                Err(BookstoreError::Query(format!(
                    "page and size must be positive (page={page}, size={size})"
                ))),
            );
        }
        let skip = (page - 1)
            .checked_mul(size)
            .ok_or_else(|| BookstoreError::Query(format!("page {page} is out of range")))?;
        let opts = FindOptions {
            sort: Some(vec![SortSpec::asc(fields::ID)]),
            skip: Some(skip),
            limit: Some(size),
            ..FindOptions::default()
        };
        self.find_books("find_page", &Filter::True, &opts).await
    }

    async fn aggregate(&self, op: &str, pipeline: &[Stage]) -> Result<Vec<bson::Document>> {
        log::debug!("{op}: pipeline={pipeline:?}");
        let r = async { self.store()?.aggregate(pipeline).await }.await;
        logged(op, r)
    }

    /// Average of `averaged_field` per distinct `group_field`, highest first.
    ///
    /// # Errors
    /// `Connection` when closed; `Query` for malformed results.
    pub async fn group_average(
        &self,
        group_field: &str,
        averaged_field: &str,
    ) -> Result<Vec<GroupAverage>> {
        let pipeline = [
            Stage::Group {
                key: group_field.to_string(),
                accumulators: vec![
                    (out::AVERAGE.to_string(), Accumulator::Avg(averaged_field.to_string())),
                    (out::COUNT.to_string(), Accumulator::Count),
                ],
            },
            Stage::Sort(vec![SortSpec::desc(out::AVERAGE)]),
        ];
        let docs = self.aggregate("group_average", &pipeline).await?;
        logged("group_average", docs.iter().map(GroupAverage::from_document).collect())
    }

    /// The `group_field` value shared by the most records.
    ///
    /// # Errors
    /// `Connection` when closed; `Query` for malformed results.
    pub async fn group_top(&self, group_field: &str) -> Result<Option<GroupCount>> {
        let pipeline = [
            Stage::Group {
                key: group_field.to_string(),
                accumulators: vec![(out::COUNT.to_string(), Accumulator::Count)],
            },
            Stage::Sort(vec![SortSpec::desc(out::COUNT)]),
            Stage::Limit(1),
        ];
        let docs = self.aggregate("group_top", &pipeline).await?;
        logged("group_top", docs.first().map(GroupCount::from_document).transpose())
    }

    /// Records bucketed by `floor(source_field / width) * width`, ascending,
    /// with the titles in each bucket. Records without a numeric source field
    /// land in a leading bucket with no key.
    ///
    /// # Errors
    /// `Query` when `width` is not positive; `Connection` when closed.
    pub async fn group_by_bucket(&self, source_field: &str, width: i64) -> Result<Vec<Bucket>> {
        if width <= 0 {
            return logged(
                "group_by_bucket",
                Err(BookstoreError::Query(format!("bucket width must be positive, got {width}"))),
            );
        }
        let pipeline = [
            Stage::AddFields(vec![(
                out::BUCKET.to_string(),
                Expr::FloorBucket { source: source_field.to_string(), width },
            )]),
            Stage::Group {
                key: out::BUCKET.to_string(),
                accumulators: vec![
                    (out::COUNT.to_string(), Accumulator::Count),
                    (out::MEMBERS.to_string(), Accumulator::Push(fields::TITLE.to_string())),
                ],
            },
            Stage::Sort(vec![SortSpec::asc("_id")]),
        ];
        let docs = self.aggregate("group_by_bucket", &pipeline).await?;
        logged("group_by_bucket", docs.iter().map(Bucket::from_document).collect())
    }

    /// Creates each index unless it already exists. Returns the index names.
    ///
    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn ensure_indexes(&self, specs: &[IndexSpec]) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(specs.len());
        for spec in specs {
            let r = async { self.store()?.create_index(spec).await }.await;
            let name = logged("ensure_indexes", r)?;
            log::info!("index ready: {name}");
            names.push(name);
        }
        Ok(names)
    }

    /// # Errors
    /// `Connection` when closed; store errors unchanged.
    pub async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        let r = async { self.store()?.list_indexes().await }.await;
        logged("list_indexes", r)
    }

    /// Runs every demo step in order, then closes the connection.
    ///
    /// The first failing step aborts the rest; its error is returned after
    /// the connection has been closed.
    ///
    /// # Errors
    /// The first step or teardown error.
    pub async fn run_all(&mut self) -> Result<DemoReport> {
        let outcome = self.run_steps().await;
        if let Err(e) = &outcome {
            log::error!("error running queries: {e}");
        }
        let closed = self.close().await;
        let report = outcome?;
        closed?;
        log::info!("all demo steps completed ({} sections)", report.sections.len());
        Ok(report)
    }

    async fn run_steps(&self) -> Result<DemoReport> {
        let mut r = DemoReport::default();

        // basic CRUD
        let t = Task::BasicCrud;
        let books = self.find_by_field(fields::GENRE, "Fantasy").await?;
        r.push(t, "Finding books in genre: Fantasy", found(LineStyle::ByAuthor, books));
        let books = self.find_by_range_after(fields::PUBLISHED_YEAR, 2000).await?;
        r.push(t, "Finding books published after: 2000", found(LineStyle::Year, books));
        let books = self.find_by_field(fields::AUTHOR, "J.K. Rowling").await?;
        r.push(t, "Finding books by author: J.K. Rowling", found(LineStyle::Year, books));
        let modified = self.update_field(fields::TITLE, "The Hobbit", fields::PRICE, 20.99).await?;
        let after = self.find_one(fields::TITLE, "The Hobbit").await?;
        r.push(
            t,
            "Updating price for: The Hobbit to $20.99",
            Outcome::Updated { title: "The Hobbit".into(), modified, after },
        );
        let deleted = self.delete_by_field(fields::TITLE, "1984").await?;
        r.push(t, "Deleting book: 1984", Outcome::Deleted { title: "1984".into(), deleted });

        // advanced queries
        let t = Task::AdvancedQueries;
        let filter = Filter::eq(fields::IN_STOCK, true).and(Filter::gt(fields::PUBLISHED_YEAR, 2010));
        let books = self.find_where(&filter).await?;
        r.push(
            t,
            "Finding in-stock books published after 2010",
            found(LineStyle::YearAndPrice, books),
        );
        let books = self.find_with_projection(&[fields::TITLE, fields::AUTHOR, fields::PRICE]).await?;
        r.push(t, "Using projection (title, author, price only)", Outcome::Projected { books });
        for (order, label) in [(Order::Asc, "asc"), (Order::Desc, "desc")] {
            let books = self.find_sorted(fields::PRICE, order).await?;
            r.push(
                t,
                format!("Sorting books by price ({label})"),
                Outcome::Books {
                    heading: format!("Books sorted by price {label}:"),
                    style: LineStyle::Price,
                    books,
                },
            );
        }
        for page in [1, 2] {
            let books = self.find_page(page, 5).await?;
            r.push(
                t,
                format!("Pagination - Page {page} (5 books per page)"),
                Outcome::Books {
                    heading: format!("Page {page} results:"),
                    style: LineStyle::ByAuthor,
                    books,
                },
            );
        }

        // aggregation
        let t = Task::Aggregation;
        let rows = self.group_average(fields::GENRE, fields::PRICE).await?;
        r.push(t, "Average price by genre", Outcome::Averages { by: fields::GENRE.into(), rows });
        let row = self.group_top(fields::AUTHOR).await?;
        r.push(t, "Author with most books", Outcome::Top { by: "Author".into(), row });
        let rows = self.group_by_bucket(fields::PUBLISHED_YEAR, 10).await?;
        r.push(t, "Books by publication decade", Outcome::Buckets { rows });

        // indexing
        let t = Task::Indexing;
        let names = self
            .ensure_indexes(&[
                IndexSpec::ascending(&[fields::TITLE]),
                IndexSpec::ascending(&[fields::AUTHOR, fields::PUBLISHED_YEAR]),
            ])
            .await?;
        r.push(t, "Creating indexes for performance", Outcome::IndexesCreated { names });
        let indexes = self.list_indexes().await?;
        r.push(t, "Demonstrating index usage", Outcome::Indexes { indexes });

        Ok(r)
    }
}

fn found(style: LineStyle, books: Vec<Book>) -> Outcome {
    Outcome::Books { heading: format!("Found {} books:", books.len()), style, books }
}
