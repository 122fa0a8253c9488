//! MongoDB backend.
//!
//! Every typed query is rendered to the driver's document form (see
//! `query::render`) and executed by the server. The store is bound to one
//! database/collection pair from [`StoreConfig`].

use async_trait::async_trait;
use bson::{Document as BsonDocument, doc};
use futures::stream::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use parking_lot::RwLock;
use std::time::Duration;

use super::DocumentStore;
use crate::config::StoreConfig;
use crate::errors::{BookstoreError, Result};
use crate::query::{
    DeleteReport, Filter, FindOptions, IndexDescriptor, IndexSpec, Stage, UpdateDoc, UpdateReport,
    filter_to_document, index_keys_from_document, index_keys_to_document, pipeline_to_documents,
    projection_to_document, sort_to_document, update_to_document,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    InsertMany,
    Find,
    Count,
    UpdateOne,
    DeleteOne,
    DeleteMany,
    Aggregate,
    CreateIndex,
    ListIndexes,
}

impl Op {
    /// Error kind for a non-connection failure of this operation. Only data
    /// writes are `Write`; reads, aggregations and index commands are `Query`.
    fn failure(self, message: String) -> BookstoreError {
        match self {
            Self::InsertMany | Self::UpdateOne | Self::DeleteOne | Self::DeleteMany => {
                BookstoreError::Write(message)
            }
            Self::Find | Self::Count | Self::Aggregate | Self::CreateIndex | Self::ListIndexes => {
                BookstoreError::Query(message)
            }
        }
    }
}

/// Maps a driver error onto the crate's error kinds.
///
/// Unreachable servers and failed authentication are connection errors no
/// matter which operation hit them; anything else is attributed to the
/// operation that failed.
fn classify(e: &MongoError, op: Op) -> BookstoreError {
    match e.kind.as_ref() {
        ErrorKind::ServerSelection { .. }
        | ErrorKind::Authentication { .. }
        | ErrorKind::DnsResolve { .. }
        | ErrorKind::Io(_) => BookstoreError::Connection(e.to_string()),
        _ => op.failure(e.to_string()),
    }
}

pub struct MongoStore {
    client: RwLock<Option<Client>>,
    database: Database,
    collection: Collection<BsonDocument>,
}

impl MongoStore {
    /// Builds a client for `config.uri` and pings the server, so an
    /// unreachable host fails here rather than on the first query.
    ///
    /// # Errors
    /// `Connection` when the URI is invalid or the server cannot be reached.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| BookstoreError::Connection(format!("invalid uri {}: {e}", config.uri)))?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        if let Some(ms) = config.server_selection_timeout_ms {
            options.server_selection_timeout = Some(Duration::from_millis(ms));
        }
        let client =
            Client::with_options(options).map_err(|e| BookstoreError::Connection(e.to_string()))?;
        let database = client.database(&config.database);
        let collection = database.collection::<BsonDocument>(&config.collection);
        let store = Self { client: RwLock::new(Some(client)), database, collection };
        store.ping().await?;
        log::info!(
            "connected to mongodb database={} collection={}",
            config.database,
            config.collection
        );
        Ok(store)
    }

    fn collection(&self) -> Result<Collection<BsonDocument>> {
        if self.client.read().is_none() {
            return Err(BookstoreError::not_connected());
        }
        Ok(self.collection.clone())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.collection()?;
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BookstoreError::Connection(format!("ping failed: {e}")))?;
        Ok(())
    }

    async fn insert_many(&self, docs: Vec<BsonDocument>) -> Result<u64> {
        let coll = self.collection()?;
        if docs.is_empty() {
            return Ok(0);
        }
        let result = coll.insert_many(docs).await.map_err(|e| classify(&e, Op::InsertMany))?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>> {
        let coll = self.collection()?;
        let mut mongo_options = mongodb::options::FindOptions::default();
        mongo_options.sort = opts.sort.as_deref().map(sort_to_document);
        mongo_options.projection = opts.projection.as_deref().map(projection_to_document);
        mongo_options.skip = opts.skip;
        mongo_options.limit = opts.limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let cursor = coll
            .find(filter_to_document(filter))
            .with_options(mongo_options)
            .await
            .map_err(|e| classify(&e, Op::Find))?;
        cursor.try_collect().await.map_err(|e| classify(&e, Op::Find))
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let coll = self.collection()?;
        coll.count_documents(filter_to_document(filter))
            .await
            .map_err(|e| classify(&e, Op::Count))
    }

    async fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport> {
        let coll = self.collection()?;
        let result = coll
            .update_one(filter_to_document(filter), update_to_document(update))
            .await
            .map_err(|e| classify(&e, Op::UpdateOne))?;
        Ok(UpdateReport { matched: result.matched_count, modified: result.modified_count })
    }

    async fn delete_one(&self, filter: &Filter) -> Result<DeleteReport> {
        let coll = self.collection()?;
        let result = coll
            .delete_one(filter_to_document(filter))
            .await
            .map_err(|e| classify(&e, Op::DeleteOne))?;
        Ok(DeleteReport { deleted: result.deleted_count })
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteReport> {
        let coll = self.collection()?;
        let result = coll
            .delete_many(filter_to_document(filter))
            .await
            .map_err(|e| classify(&e, Op::DeleteMany))?;
        Ok(DeleteReport { deleted: result.deleted_count })
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<BsonDocument>> {
        let coll = self.collection()?;
        let cursor = coll
            .aggregate(pipeline_to_documents(pipeline))
            .await
            .map_err(|e| classify(&e, Op::Aggregate))?;
        cursor.try_collect().await.map_err(|e| classify(&e, Op::Aggregate))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        let coll = self.collection()?;
        let model = IndexModel::builder().keys(index_keys_to_document(spec)).build();
        let result = coll.create_index(model).await.map_err(|e| classify(&e, Op::CreateIndex))?;
        Ok(result.index_name)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        let coll = self.collection()?;
        let cursor = coll.list_indexes().await.map_err(|e| classify(&e, Op::ListIndexes))?;
        let models: Vec<IndexModel> =
            cursor.try_collect().await.map_err(|e| classify(&e, Op::ListIndexes))?;
        Ok(models
            .into_iter()
            .map(|m| {
                let keys = index_keys_from_document(&m.keys);
                let name = m
                    .options
                    .and_then(|o| o.name)
                    .unwrap_or_else(|| IndexSpec { keys: keys.clone() }.default_name());
                IndexDescriptor { name, keys }
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.write().take();
        if let Some(client) = client {
            client.shutdown().await;
            log::info!("mongodb client shut down");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_writes_fail_as_write_errors() {
        for op in [Op::InsertMany, Op::UpdateOne, Op::DeleteOne, Op::DeleteMany] {
            assert!(matches!(op.failure("x".into()), BookstoreError::Write(_)), "{op:?}");
        }
    }

    #[test]
    fn reads_and_index_commands_fail_as_query_errors() {
        for op in [Op::Find, Op::Count, Op::Aggregate, Op::CreateIndex, Op::ListIndexes] {
            let e = op.failure("Index already exists with different options".into());
            assert!(matches!(e, BookstoreError::Query(ref m) if m.contains("different options")), "{op:?}");
        }
    }
}
