//! Per-collection transfer controller.
//!
//! Drives one collection end-to-end: reads both counts, computes the
//! starting cursor, then loops fetch -> write in bounded batches until the
//! source total recorded at the start is reached. Transient failures are
//! retried a bounded number of times, reconnecting both stores before each
//! retry of the same offset. Progress only ever advances, in increments
//! equal to the fetched batch length, so any interruption leaves a cursor
//! an operator can resume from.

use std::time::Duration;

use crate::batch::{fetch_batch, write_batch, BatchWriteReport};
use crate::error::{StoreError, TransferError};
use crate::report::{ProgressSink, TransferEvent};
use crate::store::{Connector, DestCollection, DestStore, SourceCollection, SourceStore};

/// Engine tuning.
///
/// Defaults suit long-haul transfers over an unreliable link: small bounded
/// batches, a short pause between them to throttle both stores, and a few
/// reconnect attempts before giving up.
#[derive(Debug, Clone)]
pub struct TransferOpts {
    /// Documents fetched and written per batch.
    pub batch_size: usize,
    /// Attempts per batch before the collection fails.
    pub max_retries: u32,
    /// Pause before each retry.
    pub retry_backoff: Duration,
    /// Throttle between consecutive batches.
    pub batch_pause: Duration,
    /// Emit a resumable checkpoint whenever the cursor crosses a multiple
    /// of this many documents.
    pub checkpoint_every: u64,
    /// Server-side execution cap for a single fetch.
    pub fetch_max_time: Duration,
}

impl Default for TransferOpts {
    fn default() -> Self {
        TransferOpts {
            batch_size: 500,
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
            batch_pause: Duration::from_millis(20),
            checkpoint_every: 2_000,
            fetch_max_time: Duration::from_secs(300),
        }
    }
}

/// What happened to one collection.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CollectionSummary {
    pub collection: String,
    /// Source count taken at the start and treated as the target; documents
    /// inserted into the source afterwards are not picked up by this run.
    pub source_total: u64,
    pub starting_offset: u64,
    /// Documents moved by this run.
    pub transferred: u64,
    /// Destination count observed after completion.
    pub dest_count: u64,
    /// Document-level conflicts absorbed by the writer.
    pub conflicts: usize,
    pub skipped: bool,
}

/// Store handle pair threaded through a run; replaced wholesale whenever a
/// retry reconnects.
pub type StorePair = (Box<dyn SourceStore>, Box<dyn DestStore>);

/// Transfer a single collection.
///
/// The starting cursor is `max(destination count, resume_offset)`: whatever
/// the destination already holds is assumed to be the prefix of the source
/// scan order and is not copied again. Returns the terminal error together
/// with the exact offset at which progress stopped.
pub async fn transfer_collection(
    connector: &dyn Connector,
    stores: &mut StorePair,
    name: &str,
    resume_offset: u64,
    opts: &TransferOpts,
    sink: &dyn ProgressSink,
) -> Result<CollectionSummary, TransferError> {
    let mut source = stores.0.collection(name);
    let mut dest = stores.1.collection(name);

    let total = source
        .count()
        .await
        .map_err(|e| fail(name, resume_offset, e))?;
    let existing = dest
        .count()
        .await
        .map_err(|e| fail(name, resume_offset, e))?;
    let start = existing.max(resume_offset);

    if start >= total {
        sink.emit(&TransferEvent::CollectionSkipped {
            collection: name.to_string(),
            total,
            existing,
        });
        return Ok(CollectionSummary {
            collection: name.to_string(),
            source_total: total,
            starting_offset: start,
            transferred: 0,
            dest_count: existing,
            conflicts: 0,
            skipped: true,
        });
    }

    sink.emit(&TransferEvent::CollectionStarted {
        collection: name.to_string(),
        total,
        starting_offset: start,
    });

    let mut transferred = start;
    let mut conflicts = 0usize;

    while transferred < total {
        // Clamp the final batch so the cursor never runs past the total
        // recorded above, even if the source gained documents since.
        let limit = opts.batch_size.min((total - transferred) as usize);
        let mut attempt = 0u32;
        let (fetched, report) = loop {
            attempt += 1;
            match run_batch(source.as_ref(), dest.as_ref(), transferred, limit, opts).await {
                Ok(outcome) => break outcome,
                Err(err) if err.is_transient() && attempt < opts.max_retries => {
                    sink.emit(&TransferEvent::Retrying {
                        collection: name.to_string(),
                        offset: transferred,
                        attempt,
                        max_retries: opts.max_retries,
                        error: err.to_string(),
                    });
                    tokio::time::sleep(opts.retry_backoff).await;

                    // Replace both connections before retrying the same offset.
                    match connector.connect().await {
                        Ok(pair) => {
                            *stores = pair;
                            source = stores.0.collection(name);
                            dest = stores.1.collection(name);
                        }
                        Err(reconnect_err) => {
                            // The attempt is spent either way; the stale
                            // handles stay in place for the next try.
                            tracing::error!("Reconnection failed: {reconnect_err}");
                        }
                    }
                }
                Err(err) if err.is_transient() => {
                    return Err(TransferError::RetriesExhausted {
                        collection: name.to_string(),
                        offset: transferred,
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    return Err(TransferError::Store {
                        collection: name.to_string(),
                        offset: transferred,
                        source: err,
                    });
                }
            }
        };

        if fetched == 0 {
            // The source shrank since its count was taken; treat the scan
            // as exhausted rather than spinning on an unreachable total.
            tracing::warn!(
                "Source scan of '{}' exhausted at {} of {} expected documents",
                name,
                transferred,
                total
            );
            break;
        }

        let prev = transferred;
        transferred += fetched as u64;
        conflicts += report.conflicts;

        sink.emit(&TransferEvent::BatchTransferred {
            collection: name.to_string(),
            delta: fetched as u64,
            transferred,
            total,
            conflicts: report.conflicts,
        });
        if crossed_checkpoint(prev, transferred, opts.checkpoint_every) {
            sink.emit(&TransferEvent::Checkpoint {
                collection: name.to_string(),
                offset: transferred,
                total,
            });
        }

        tokio::time::sleep(opts.batch_pause).await;
    }

    let dest_count = dest.count().await.map_err(|e| fail(name, transferred, e))?;
    sink.emit(&TransferEvent::CollectionVerified {
        collection: name.to_string(),
        source_total: total,
        dest_count,
    });

    Ok(CollectionSummary {
        collection: name.to_string(),
        source_total: total,
        starting_offset: start,
        transferred: transferred - start,
        dest_count,
        conflicts,
        skipped: false,
    })
}

async fn run_batch(
    source: &dyn SourceCollection,
    dest: &dyn DestCollection,
    offset: u64,
    limit: usize,
    opts: &TransferOpts,
) -> Result<(usize, BatchWriteReport), StoreError> {
    let batch = fetch_batch(source, offset, limit, opts.fetch_max_time).await?;
    if batch.is_empty() {
        return Ok((0, BatchWriteReport::default()));
    }
    let report = write_batch(dest, &batch).await?;
    Ok((batch.len(), report))
}

fn crossed_checkpoint(prev: u64, now: u64, every: u64) -> bool {
    every > 0 && prev / every != now / every
}

fn fail(name: &str, offset: u64, source: StoreError) -> TransferError {
    TransferError::Store {
        collection: name.to_string(),
        offset,
        source,
    }
}
