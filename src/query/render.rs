//! Rendering of typed queries into MongoDB command documents.

use bson::{Bson, Document as BsonDocument, doc};

use super::pipeline::{Accumulator, Expr, Stage};
use super::types::{CmpOp, Filter, IndexSpec, Order, SortSpec, UpdateDoc};

#[must_use]
pub fn filter_to_document(filter: &Filter) -> BsonDocument {
    match filter {
        Filter::True => BsonDocument::new(),
        Filter::Cmp { path, op: CmpOp::Eq, value } => {
            let mut d = BsonDocument::new();
            d.insert(path.clone(), value.clone());
            d
        }
        Filter::Cmp { path, op, value } => {
            let mut inner = BsonDocument::new();
            inner.insert(op.operator(), value.clone());
            let mut d = BsonDocument::new();
            d.insert(path.clone(), inner);
            d
        }
        Filter::And(fs) => match fs.as_slice() {
            [] => BsonDocument::new(),
            [only] => filter_to_document(only),
            many => {
                let clauses: Vec<Bson> =
                    many.iter().map(|f| Bson::Document(filter_to_document(f))).collect();
                doc! { "$and": clauses }
            }
        },
    }
}

#[must_use]
pub fn sort_to_document(sort: &[SortSpec]) -> BsonDocument {
    let mut d = BsonDocument::new();
    for s in sort {
        d.insert(s.field.clone(), s.order.direction());
    }
    d
}

/// Inclusion projection with `_id` suppressed.
#[must_use]
pub fn projection_to_document(fields: &[String]) -> BsonDocument {
    let mut d = BsonDocument::new();
    for f in fields {
        d.insert(f.clone(), 1);
    }
    d.insert("_id", 0);
    d
}

#[must_use]
pub fn update_to_document(update: &UpdateDoc) -> BsonDocument {
    let mut set = BsonDocument::new();
    for (k, v) in &update.set {
        set.insert(k.clone(), v.clone());
    }
    doc! { "$set": set }
}

fn field_ref(path: &str) -> String {
    format!("${path}")
}

fn expr_to_bson(expr: &Expr) -> Bson {
    match expr {
        Expr::FloorBucket { source, width } => Bson::Document(doc! {
            "$multiply": [
                { "$floor": { "$divide": [field_ref(source), *width] } },
                *width,
            ]
        }),
    }
}

fn accumulator_to_bson(acc: &Accumulator) -> Bson {
    Bson::Document(match acc {
        Accumulator::Avg(path) => doc! { "$avg": field_ref(path) },
        Accumulator::Count => doc! { "$sum": 1 },
        Accumulator::Push(path) => doc! { "$push": field_ref(path) },
    })
}

#[must_use]
pub fn stage_to_document(stage: &Stage) -> BsonDocument {
    match stage {
        Stage::AddFields(exprs) => {
            let mut fields = BsonDocument::new();
            for (name, e) in exprs {
                fields.insert(name.clone(), expr_to_bson(e));
            }
            doc! { "$addFields": fields }
        }
        Stage::Group { key, accumulators } => {
            let mut g = doc! { "_id": field_ref(key) };
            for (name, acc) in accumulators {
                g.insert(name.clone(), accumulator_to_bson(acc));
            }
            doc! { "$group": g }
        }
        Stage::Sort(spec) => doc! { "$sort": sort_to_document(spec) },
        #[allow(clippy::cast_possible_wrap)]
        Stage::Limit(n) => doc! { "$limit": *n as i64 },
    }
}

#[must_use]
pub fn pipeline_to_documents(stages: &[Stage]) -> Vec<BsonDocument> {
    stages.iter().map(stage_to_document).collect()
}

#[must_use]
pub fn index_keys_to_document(spec: &IndexSpec) -> BsonDocument {
    sort_to_document(&spec.keys)
}

/// Reads an index key document back into key specs.
/// Non-directional keys (`"text"`, `"2dsphere"`) are reported as ascending.
#[must_use]
pub fn index_keys_from_document(keys: &BsonDocument) -> Vec<SortSpec> {
    keys.iter()
        .map(|(field, v)| {
            let order = match v {
                Bson::Int32(d) => Order::from_direction(i64::from(*d)),
                Bson::Int64(d) => Order::from_direction(*d),
                #[allow(clippy::cast_possible_truncation)]
                Bson::Double(d) => Order::from_direction(*d as i64),
                _ => None,
            };
            SortSpec { field: field.clone(), order: order.unwrap_or(Order::Asc) }
        })
        .collect()
}
