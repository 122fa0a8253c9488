use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;

use super::DocumentStore;
use crate::errors::{BookstoreError, Result};
use crate::query::{
    DeleteReport, Filter, FindOptions, IndexDescriptor, IndexSpec, MAX_PROJECTION_FIELDS, SortSpec,
    Stage, UpdateDoc, UpdateReport, compare_docs, eval_filter, project_fields, run_pipeline,
};

const ID_INDEX: &str = "_id_";

#[derive(Default)]
struct State {
    docs: Vec<BsonDocument>,
    indexes: Vec<IndexDescriptor>,
    closed: bool,
    reject_writes: Option<String>,
}

/// In-process store holding one collection in insertion order.
///
/// Index specs are recorded as descriptors only; lookups always scan.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with `Write(reason)`.
    pub fn reject_writes(&self, reason: &str) {
        self.state.write().reject_writes = Some(reason.to_string());
    }

    pub fn accept_writes(&self) {
        self.state.write().reject_writes = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    fn check_open(state: &State) -> Result<()> {
        if state.closed { Err(BookstoreError::not_connected()) } else { Ok(()) }
    }

    fn check_writable(state: &State) -> Result<()> {
        Self::check_open(state)?;
        match &state.reject_writes {
            Some(reason) => Err(BookstoreError::Write(reason.clone())),
            None => Ok(()),
        }
    }
}

fn set_path(root: &mut BsonDocument, path: &str, value: Bson) -> bool {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            let old = cur.insert(seg.to_string(), value.clone());
            return old.as_ref() != Some(&value);
        }
        if !matches!(cur.get(seg), Some(Bson::Document(_))) {
            cur.insert(seg.to_string(), Bson::Document(BsonDocument::new()));
        }
        cur = match cur.get_mut(seg) {
            Some(Bson::Document(d)) => d,
            _ => return false,
        };
    }
    false
}

fn apply_update(doc: &mut BsonDocument, update: &UpdateDoc) -> bool {
    let mut changed = false;
    for (k, v) in &update.set {
        if set_path(doc, k, v.clone()) {
            changed = true;
        }
    }
    changed
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Self::check_open(&self.state.read())
    }

    async fn insert_many(&self, docs: Vec<BsonDocument>) -> Result<u64> {
        let mut state = self.state.write();
        Self::check_writable(&state)?;
        let mut n = 0u64;
        for mut d in docs {
            if !d.contains_key("_id") {
                d.insert("_id", ObjectId::new());
            }
            state.docs.push(d);
            n += 1;
        }
        log::debug!("memory: inserted {n} documents");
        Ok(n)
    }

    async fn find(&self, filter: &Filter, opts: &FindOptions) -> Result<Vec<BsonDocument>> {
        let state = self.state.read();
        Self::check_open(&state)?;
        let mut docs: Vec<BsonDocument> =
            state.docs.iter().filter(|d| eval_filter(d, filter)).cloned().collect();
        drop(state);

        if let Some(sort) = &opts.sort {
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }
        if let Some(fields) = &opts.projection {
            let fields: Vec<String> = fields.iter().take(MAX_PROJECTION_FIELDS).cloned().collect();
            for d in &mut docs {
                *d = project_fields(d, &fields);
            }
        }
        let skip = usize::try_from(opts.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        // limit 0 means "no limit", as with the server
        let limit = match opts.limit {
            Some(0) | None => usize::MAX,
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        };
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let state = self.state.read();
        Self::check_open(&state)?;
        Ok(state.docs.iter().filter(|d| eval_filter(d, filter)).count() as u64)
    }

    async fn update_one(&self, filter: &Filter, update: &UpdateDoc) -> Result<UpdateReport> {
        let mut state = self.state.write();
        Self::check_writable(&state)?;
        let Some(doc) = state.docs.iter_mut().find(|d| eval_filter(d, filter)) else {
            return Ok(UpdateReport { matched: 0, modified: 0 });
        };
        let changed = apply_update(doc, update);
        Ok(UpdateReport { matched: 1, modified: u64::from(changed) })
    }

    async fn delete_one(&self, filter: &Filter) -> Result<DeleteReport> {
        let mut state = self.state.write();
        Self::check_writable(&state)?;
        match state.docs.iter().position(|d| eval_filter(d, filter)) {
            Some(i) => {
                state.docs.remove(i);
                Ok(DeleteReport { deleted: 1 })
            }
            None => Ok(DeleteReport { deleted: 0 }),
        }
    }

    async fn delete_many(&self, filter: &Filter) -> Result<DeleteReport> {
        let mut state = self.state.write();
        Self::check_writable(&state)?;
        let before = state.docs.len();
        state.docs.retain(|d| !eval_filter(d, filter));
        Ok(DeleteReport { deleted: (before - state.docs.len()) as u64 })
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<BsonDocument>> {
        let docs = {
            let state = self.state.read();
            Self::check_open(&state)?;
            state.docs.clone()
        };
        run_pipeline(docs, pipeline)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        if spec.keys.is_empty() {
            return Err(BookstoreError::Query("index specification has no keys".into()));
        }
        let mut state = self.state.write();
        Self::check_open(&state)?;
        let name = spec.default_name();
        match state.indexes.iter().find(|i| i.name == name) {
            Some(existing) if existing.keys != spec.keys => {
                return Err(BookstoreError::Query(format!(
                    "index {name} already exists with different keys"
                )));
            }
            Some(_) => {}
            None => state.indexes.push(IndexDescriptor { name: name.clone(), keys: spec.keys.clone() }),
        }
        Ok(name)
    }

    async fn list_indexes(&self) -> Result<Vec<IndexDescriptor>> {
        let state = self.state.read();
        Self::check_open(&state)?;
        let mut out = vec![IndexDescriptor { name: ID_INDEX.into(), keys: vec![SortSpec::asc("_id")] }];
        out.extend(state.indexes.iter().cloned());
        Ok(out)
    }

    async fn close(&self) -> Result<()> {
        self.state.write().closed = true;
        Ok(())
    }
}
