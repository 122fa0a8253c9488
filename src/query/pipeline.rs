//! Typed aggregation pipeline stages and their in-process execution.
//!
//! Only the stages the facade builds are modelled: a floor-bucket `$addFields`,
//! `$group` with `$avg` / `$sum: 1` / `$push`, `$sort` and `$limit`.

use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

use super::eval::{as_f64, compare_docs, get_path};
use super::types::SortSpec;
use crate::errors::{BookstoreError, Result};

/// Computed field expression for `$addFields`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `floor(source / width) * width`
    FloorBucket { source: String, width: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Avg(String),
    Count,
    Push(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    AddFields(Vec<(String, Expr)>),
    Group { key: String, accumulators: Vec<(String, Accumulator)> },
    Sort(Vec<SortSpec>),
    Limit(u64),
}

/// Runs `stages` over `docs` in order.
///
/// # Errors
/// `Query` when a stage is malformed (empty group key, zero bucket width).
pub fn run_pipeline(mut docs: Vec<BsonDocument>, stages: &[Stage]) -> Result<Vec<BsonDocument>> {
    for stage in stages {
        docs = match stage {
            Stage::AddFields(exprs) => {
                for d in &mut docs {
                    for (name, expr) in exprs {
                        let v = eval_expr(d, expr)?;
                        d.insert(name.clone(), v);
                    }
                }
                docs
            }
            Stage::Group { key, accumulators } => group(&docs, key, accumulators)?,
            Stage::Sort(spec) => {
                // sort_by is stable; ties keep pipeline order
                docs.sort_by(|a, b| compare_docs(a, b, spec));
                docs
            }
            Stage::Limit(n) => {
                docs.truncate(usize::try_from(*n).unwrap_or(usize::MAX));
                docs
            }
        };
    }
    Ok(docs)
}

fn eval_expr(doc: &BsonDocument, expr: &Expr) -> Result<Bson> {
    match expr {
        Expr::FloorBucket { source, width } => {
            if *width == 0 {
                return Err(BookstoreError::Query("can't $divide by zero".into()));
            }
            #[allow(clippy::cast_precision_loss)]
            let w = *width as f64;
            Ok(match get_path(doc, source).and_then(as_f64) {
                Some(v) => Bson::Double((v / w).floor() * w),
                None => Bson::Null,
            })
        }
    }
}

enum AccState {
    Avg { sum: f64, n: u64 },
    Count(i64),
    Push(Vec<Bson>),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Avg(_) => Self::Avg { sum: 0.0, n: 0 },
            Accumulator::Count => Self::Count(0),
            Accumulator::Push(_) => Self::Push(Vec::new()),
        }
    }

    fn feed(&mut self, acc: &Accumulator, doc: &BsonDocument) {
        match (self, acc) {
            (Self::Avg { sum, n }, Accumulator::Avg(path)) => {
                if let Some(v) = get_path(doc, path).and_then(as_f64) {
                    *sum += v;
                    *n += 1;
                }
            }
            (Self::Count(c), Accumulator::Count) => *c += 1,
            (Self::Push(items), Accumulator::Push(path)) => {
                if let Some(v) = get_path(doc, path) {
                    items.push(v.clone());
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Bson {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Avg { sum, n } if n > 0 => Bson::Double(sum / n as f64),
            Self::Avg { .. } => Bson::Null,
            Self::Count(c) => match i32::try_from(c) {
                Ok(c) => Bson::Int32(c),
                Err(_) => Bson::Int64(c),
            },
            Self::Push(items) => Bson::Array(items),
        }
    }
}

fn same_key(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn group(
    docs: &[BsonDocument],
    key: &str,
    accumulators: &[(String, Accumulator)],
) -> Result<Vec<BsonDocument>> {
    if key.is_empty() {
        return Err(BookstoreError::Query("$group requires an _id expression".into()));
    }
    // first-seen order
    let mut groups: Vec<(Bson, Vec<AccState>)> = Vec::new();
    for d in docs {
        let k = get_path(d, key).cloned().unwrap_or(Bson::Null);
        let idx = match groups.iter().position(|(g, _)| same_key(g, &k)) {
            Some(i) => i,
            None => {
                groups.push((k, accumulators.iter().map(|(_, a)| AccState::new(a)).collect()));
                groups.len() - 1
            }
        };
        for (state, (_, acc)) in groups[idx].1.iter_mut().zip(accumulators) {
            state.feed(acc, d);
        }
    }
    Ok(groups
        .into_iter()
        .map(|(k, states)| {
            let mut out = BsonDocument::new();
            out.insert("_id", k);
            for (state, (name, _)) in states.into_iter().zip(accumulators) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect())
}

/// One row of `group_average`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAverage {
    pub group: Bson,
    /// `None` when no record in the group had a numeric value.
    pub average: Option<f64>,
    pub count: u64,
}

/// One row of `group_top`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    pub group: Bson,
    pub count: u64,
}

/// One row of `group_by_bucket`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// `None` for records whose source field is missing or not numeric.
    pub bucket: Option<i64>,
    pub count: u64,
    pub members: Vec<String>,
}

pub(crate) mod out {
    pub const AVERAGE: &str = "average";
    pub const COUNT: &str = "count";
    pub const MEMBERS: &str = "members";
    pub const BUCKET: &str = "bucket";
}

fn count_of(d: &BsonDocument) -> Result<u64> {
    d.get(out::COUNT)
        .and_then(as_f64)
        .filter(|c| *c >= 0.0)
        .map(|c| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let n = c as u64;
            n
        })
        .ok_or_else(|| BookstoreError::Query("aggregation result without a count".into()))
}

impl GroupAverage {
    /// # Errors
    /// `Query` when the row lacks a count.
    pub fn from_document(d: &BsonDocument) -> Result<Self> {
        Ok(Self {
            group: d.get("_id").cloned().unwrap_or(Bson::Null),
            average: d.get(out::AVERAGE).and_then(as_f64),
            count: count_of(d)?,
        })
    }
}

impl GroupCount {
    /// # Errors
    /// `Query` when the row lacks a count.
    pub fn from_document(d: &BsonDocument) -> Result<Self> {
        Ok(Self { group: d.get("_id").cloned().unwrap_or(Bson::Null), count: count_of(d)? })
    }
}

impl Bucket {
    /// # Errors
    /// `Query` when the row lacks a count.
    pub fn from_document(d: &BsonDocument) -> Result<Self> {
        #[allow(clippy::cast_possible_truncation)]
        let bucket = d.get("_id").and_then(as_f64).map(|b| b as i64);
        let members = match d.get(out::MEMBERS) {
            Some(Bson::Array(items)) => items
                .iter()
                .filter_map(|v| match v {
                    Bson::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self { bucket, count: count_of(d)?, members })
    }
}
