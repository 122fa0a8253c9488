use bson::Bson;
use serde::{Deserialize, Serialize};

// Guards applied by the in-process evaluator
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// The `1` / `-1` direction used in sort and index key documents.
    #[must_use]
    pub fn direction(self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }

    #[must_use]
    pub fn from_direction(d: i64) -> Option<Self> {
        match d {
            1 => Some(Self::Asc),
            -1 => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

/// Options for `find`.
///
/// Semantics:
/// - Sorting is applied before projection.
/// - When `projection` is `Some(fields)`, results contain only those fields and never `_id`.
/// - Results are sliced by `skip`/`limit` last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Vec<String>>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub(crate) fn operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Eq, value: value.into() }
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Gt, value: value.into() }
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Gte, value: value.into() }
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Lt, value: value.into() }
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::Cmp { path: path.into(), op: CmpOp::Lte, value: value.into() }
    }

    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::True => other,
            Self::And(mut fs) => {
                fs.push(other);
                Self::And(fs)
            }
            f => Self::And(vec![f, other]),
        }
    }
}

/// `$set`-only update.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
}

impl UpdateDoc {
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self { set: vec![(field.into(), value.into())] }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}

/// Fields of one index, in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<SortSpec>,
}

impl IndexSpec {
    /// Ascending index over `fields`.
    #[must_use]
    pub fn ascending(fields: &[&str]) -> Self {
        Self { keys: fields.iter().map(|f| SortSpec::asc(*f)).collect() }
    }

    /// Conventional index name: `author_1_published_year_1`.
    #[must_use]
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("{}_{}", k.field, k.order.direction()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// An index as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub keys: Vec<SortSpec>,
}
