//! Transfer progress reporting.
//!
//! The engine pushes structured events to a [`ProgressSink`] instead of
//! logging inline, so the CLI can render them while tests capture them.
//! [`LogSink`] is the tracing-backed renderer used by the binary.

/// Events emitted over the course of a transfer run.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    RunStarted {
        collections: usize,
    },
    CollectionStarted {
        collection: String,
        total: u64,
        starting_offset: u64,
    },
    /// The destination already holds every source document.
    CollectionSkipped {
        collection: String,
        total: u64,
        existing: u64,
    },
    /// One batch was written and the cursor advanced by `delta`.
    BatchTransferred {
        collection: String,
        delta: u64,
        transferred: u64,
        total: u64,
        conflicts: usize,
    },
    /// Periodic operator-resumable position.
    Checkpoint {
        collection: String,
        offset: u64,
        total: u64,
    },
    Retrying {
        collection: String,
        offset: u64,
        attempt: u32,
        max_retries: u32,
        error: String,
    },
    /// The named resume collection is not in the source catalog.
    UnknownResumeCollection {
        collection: String,
    },
    /// Counts observed after a collection completed. A mismatch is
    /// reported, never raised.
    CollectionVerified {
        collection: String,
        source_total: u64,
        dest_count: u64,
    },
    CollectionFailed {
        collection: String,
        offset: u64,
        error: String,
    },
    RunCompleted {
        collections: usize,
        documents: u64,
    },
}

/// Consumer of transfer events.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &TransferEvent);
}

/// Renders events through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: &TransferEvent) {
        match event {
            TransferEvent::RunStarted { collections } => {
                tracing::info!("Found {} collections to transfer", collections);
            }
            TransferEvent::CollectionStarted {
                collection,
                total,
                starting_offset,
            } => {
                tracing::info!(
                    "Starting transfer of collection '{}': {} documents, starting from {}",
                    collection,
                    total,
                    starting_offset
                );
            }
            TransferEvent::CollectionSkipped {
                collection,
                total,
                existing,
            } => {
                if *total == 0 {
                    tracing::info!("No documents found in '{}'", collection);
                } else {
                    tracing::info!(
                        "Collection '{}' already fully transferred, skipping ({} of {} present)",
                        collection,
                        existing,
                        total
                    );
                }
            }
            TransferEvent::BatchTransferred {
                collection,
                delta,
                transferred,
                total,
                conflicts,
            } => {
                if *conflicts > 0 {
                    tracing::warn!(
                        "Ignored {} document conflicts in '{}' around offset {}",
                        conflicts,
                        collection,
                        transferred - delta
                    );
                }
                tracing::debug!(
                    "Processed {}/{} documents from '{}'",
                    transferred,
                    total,
                    collection
                );
            }
            TransferEvent::Checkpoint {
                collection,
                offset,
                total,
            } => {
                tracing::info!(
                    "Progress checkpoint: {}/{} documents transferred, resume with --collection '{}' --offset {}",
                    offset,
                    total,
                    collection,
                    offset
                );
            }
            TransferEvent::Retrying {
                collection,
                offset,
                attempt,
                max_retries,
                error,
            } => {
                tracing::warn!(
                    "Attempt {}/{} failed for '{}' batch starting at {}: {}",
                    attempt,
                    max_retries,
                    collection,
                    offset,
                    error
                );
            }
            TransferEvent::UnknownResumeCollection { collection } => {
                tracing::warn!(
                    "Collection '{}' not found in source, starting from beginning",
                    collection
                );
            }
            TransferEvent::CollectionVerified {
                collection,
                source_total,
                dest_count,
            } => {
                tracing::info!(
                    "Verification of '{}' - Source: {}, Destination: {}",
                    collection,
                    source_total,
                    dest_count
                );
            }
            TransferEvent::CollectionFailed {
                collection,
                offset,
                error,
            } => {
                tracing::error!(
                    "Transfer of '{}' stopped at offset {}: {}; resume with --collection '{}' --offset {}",
                    collection,
                    offset,
                    error,
                    collection,
                    offset
                );
            }
            TransferEvent::RunCompleted {
                collections,
                documents,
            } => {
                tracing::info!(
                    "Transfer completed: {} collections, {} documents",
                    collections,
                    documents
                );
            }
        }
    }
}
