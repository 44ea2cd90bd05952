//! Error taxonomy for the transfer engine.
//!
//! Failures are classified by how the engine must react to them:
//!
//! - [`StoreError::Transient`] - the store was unreachable or an operation
//!   failed server-side; the whole batch is retried on a fresh connection.
//! - [`StoreError::Duplicate`] - a single document conflicted with one
//!   already present; absorbed by the batch writer.
//! - [`StoreError::Write`] - a bulk write failed for document-level reasons;
//!   the writer degrades to per-document inserts.
//! - [`StoreError::Other`] - unclassified; aborts the run.
//!
//! Terminal failures surface as [`TransferError`], which always carries the
//! exact offset at which progress stopped so the operator can resume there.

use thiserror::Error;

/// Classified failure from a single store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation could not be attempted or completed because the store
    /// was unreachable, timed out, or failed server-side.
    #[error("transient store failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// A single document conflicted with one already in the destination,
    /// typically a duplicate key left behind by an earlier partial write.
    #[error("duplicate document: {0}")]
    Duplicate(String),

    /// A bulk write failed or partially failed for document-level reasons.
    #[error("bulk write failed: {0}")]
    Write(#[source] anyhow::Error),

    /// Anything the taxonomy does not cover.
    #[error(transparent)]
    Other(anyhow::Error),
}

impl StoreError {
    /// Whether the failure warrants a reconnect-and-retry cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Terminal failure of a collection transfer.
///
/// Both variants name the collection and the offset at which progress
/// stopped; re-invoking resume with that pair continues the run.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Every attempt at the same batch failed with a transient error.
    #[error(
        "collection '{collection}' failed at offset {offset} after {attempts} attempts: {source}"
    )]
    RetriesExhausted {
        collection: String,
        offset: u64,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    /// A store operation failed in a way the retry policy does not cover.
    #[error("collection '{collection}' failed at offset {offset}: {source}")]
    Store {
        collection: String,
        offset: u64,
        #[source]
        source: StoreError,
    },
}

impl TransferError {
    /// Collection in which progress stopped.
    pub fn collection(&self) -> &str {
        match self {
            TransferError::RetriesExhausted { collection, .. }
            | TransferError::Store { collection, .. } => collection,
        }
    }

    /// Offset to resume this collection from.
    pub fn offset(&self) -> u64 {
        match self {
            TransferError::RetriesExhausted { offset, .. }
            | TransferError::Store { offset, .. } => *offset,
        }
    }
}
