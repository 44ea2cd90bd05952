//! Batch fetch and write primitives.
//!
//! A batch is a bounded contiguous slice of the source collection, read at
//! the current cursor offset and written to the destination immediately.
//! The writer is best-effort at the document level: duplicates left behind
//! by an earlier partial write must not abort the batch, so delivery is
//! at-least-once rather than exactly-once.

use std::time::Duration;

use bson::Document;

use crate::error::StoreError;
use crate::store::{DestCollection, SourceCollection, StoreResult};

/// Outcome of writing one batch.
///
/// `attempted` counts documents handed to the store, `confirmed` those it
/// acknowledged, `conflicts` those absorbed as document-level failures.
/// `attempted` drives cursor advancement; `confirmed` can legitimately be
/// lower when the destination already held some of the documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWriteReport {
    pub attempted: usize,
    pub confirmed: usize,
    pub conflicts: usize,
}

/// Read up to `limit` documents starting at `offset`.
///
/// An empty result means the source has no documents left at or beyond
/// `offset`, which can happen mid-run if the source shrank after its count
/// was taken.
pub async fn fetch_batch(
    source: &dyn SourceCollection,
    offset: u64,
    limit: usize,
    max_time: Duration,
) -> StoreResult<Vec<Document>> {
    debug_assert!(limit > 0);
    let docs = source.scan(offset, limit, max_time).await?;
    tracing::trace!("Fetched {} documents at offset {}", docs.len(), offset);
    Ok(docs)
}

/// Write one batch to the destination.
///
/// Tries a single unordered bulk insert first. If that fails for
/// document-level reasons (typically duplicate keys from a prior partial
/// write), falls back to inserting the documents one by one, absorbing
/// per-document conflicts into the report. Transient connectivity failures
/// propagate in both paths: they mean the batch itself could not be
/// attempted and must be retried as a whole.
pub async fn write_batch(
    dest: &dyn DestCollection,
    batch: &[Document],
) -> StoreResult<BatchWriteReport> {
    match dest.bulk_insert(batch).await {
        Ok(()) => Ok(BatchWriteReport {
            attempted: batch.len(),
            confirmed: batch.len(),
            conflicts: 0,
        }),
        Err(err @ StoreError::Transient(_)) => Err(err),
        Err(err) => {
            tracing::debug!("Bulk insert degraded to per-document inserts: {err}");
            write_one_by_one(dest, batch).await
        }
    }
}

async fn write_one_by_one(
    dest: &dyn DestCollection,
    batch: &[Document],
) -> StoreResult<BatchWriteReport> {
    let mut report = BatchWriteReport {
        attempted: batch.len(),
        ..BatchWriteReport::default()
    };
    for doc in batch {
        match dest.insert_one(doc).await {
            Ok(()) => report.confirmed += 1,
            Err(err @ StoreError::Transient(_)) => return Err(err),
            Err(err) => {
                report.conflicts += 1;
                tracing::trace!("Ignored document-level insert failure: {err}");
            }
        }
    }
    Ok(report)
}
