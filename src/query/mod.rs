// Submodules for separation of concerns
mod eval;
mod pipeline;
mod render;
mod types;

// Public API re-exports
pub use eval::{as_f64, compare_bson, compare_docs, eval_filter, project_fields};
pub use pipeline::{Accumulator, Bucket, Expr, GroupAverage, GroupCount, Stage, run_pipeline};
pub(crate) use pipeline::out;
pub use render::{
    filter_to_document, index_keys_from_document, index_keys_to_document, pipeline_to_documents,
    projection_to_document, sort_to_document, stage_to_document, update_to_document,
};
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, IndexDescriptor, IndexSpec, Order, SortSpec,
    UpdateDoc, UpdateReport,
};
pub(crate) use types::MAX_PROJECTION_FIELDS;
