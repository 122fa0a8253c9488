use crate::book::Book;
use crate::errors::{BookstoreError, Result};
use crate::query::Filter;
use crate::store::DocumentStore;

/// Replaces the whole collection with `records`.
///
/// Every record is validated before the collection is touched, so an invalid
/// batch leaves existing data in place. Returns the number of records inserted.
///
/// # Errors
/// - `InvalidRecord` for the first record failing [`Book::validate`].
/// - `Connection` when the store is unreachable.
/// - `Write` when the store rejects the delete or the insert.
pub async fn reset_and_load<S: DocumentStore + ?Sized>(store: &S, records: &[Book]) -> Result<u64> {
    for (index, book) in records.iter().enumerate() {
        if let Err(reason) = book.validate() {
            log::error!("seed rejected: record {index} ({:?}): {reason}", book.title);
            return Err(BookstoreError::InvalidRecord { index, reason });
        }
    }

    let cleared = store.delete_many(&Filter::True).await.inspect_err(|e| {
        log::error!("seed: clearing collection failed: {e}");
    })?;
    log::info!("seed: removed {} existing records", cleared.deleted);

    if records.is_empty() {
        return Ok(0);
    }
    let docs = records.iter().map(Book::to_document).collect();
    let inserted = store.insert_many(docs).await.inspect_err(|e| {
        log::error!("seed: inserting {} records failed: {e}", records.len());
    })?;
    log::info!("seed: {inserted} books inserted into {} store", store.backend_name());
    Ok(inserted)
}
