//! Collection-scoped access to a document store.
//!
//! The facade only talks to [`DocumentStore`]. [`MongoStore`] forwards every
//! call to a MongoDB server; [`MemoryStore`] evaluates the same typed queries
//! in-process and backs the test suite and `--memory` runs.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use bson::Document as BsonDocument;

use crate::errors::Result;
use crate::query::{
    DeleteReport, Filter, FindOptions, IndexDescriptor, IndexSpec, Stage, UpdateDoc, UpdateReport,
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend label for logs ("mongodb", "memory").
    fn backend_name(&self) -> &'static str;

    /// Round-trip to the store; fails with `Connection` when unreachable.
    async fn ping(&self) -> Result<()>;

    /// Returns the number of documents inserted.
    async fn insert_many(&self, docs: Vec<BsonDocument>) -> Result<u64>;

    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>>;

    async fn count(&self, filter: &Filter) -> Result<u64>;

    /// Updates the first document matching `filter`.
    async fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport>;

    /// Deletes the first document matching `filter`.
    async fn delete_one(&self, filter: &Filter) -> Result<DeleteReport>;

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteReport>;

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<BsonDocument>>;

    /// Creates the index if missing and returns its name.
    async fn create_index(&self, spec: &IndexSpec) -> Result<String>;

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>>;

    /// Releases the connection. Later calls fail with `Connection`.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn insert_many(&self, docs: Vec<BsonDocument>) -> Result<u64> {
        (**self).insert_many(docs).await
    }

    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>> {
        (**self).find(filter, opts).await
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        (**self).count(filter).await
    }

    async fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport> {
        (**self).update_one(filter, update).await
    }

    async fn delete_one(&self, filter: &Filter) -> Result<DeleteReport> {
        (**self).delete_one(filter).await
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteReport> {
        (**self).delete_many(filter).await
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<BsonDocument>> {
        (**self).aggregate(pipeline).await
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        (**self).create_index(spec).await
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        (**self).list_indexes().await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
