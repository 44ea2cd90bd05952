//! Whole-database transfer orchestration.
//!
//! Enumerates the source catalog and hands each collection to the transfer
//! controller in turn. Collections are strictly sequential; the first
//! terminal failure aborts the run with the collection and offset needed to
//! resume. Resumability needs no state of its own - the destination's
//! document counts are the durable record of progress, optionally bumped by
//! an explicit offset for the first collection.

use std::time::{Duration, Instant};

use anyhow::Context;

use crate::report::{ProgressSink, TransferEvent};
use crate::store::Connector;
use crate::transfer::{transfer_collection, CollectionSummary, TransferOpts};

/// Where to pick a previously interrupted run back up.
///
/// The offset applies to the named collection only; every later collection
/// resumes from its destination count alone. An empty name behaves as if no
/// name was given.
#[derive(Debug, Clone, Default)]
pub struct ResumePoint {
    pub collection: Option<String>,
    pub offset: u64,
}

/// Outcome of a completed run.
#[derive(Debug, serde::Serialize)]
pub struct RunSummary {
    pub collections: Vec<CollectionSummary>,
    /// Documents moved by this run across all collections.
    pub documents: u64,
    pub duration: Duration,
}

/// Copy every collection of the source database to the destination.
pub async fn run_full(
    connector: &dyn Connector,
    opts: &TransferOpts,
    sink: &dyn ProgressSink,
) -> anyhow::Result<RunSummary> {
    run(connector, None, opts, sink).await
}

/// Resume a previously interrupted run.
pub async fn run_resume(
    connector: &dyn Connector,
    resume: ResumePoint,
    opts: &TransferOpts,
    sink: &dyn ProgressSink,
) -> anyhow::Result<RunSummary> {
    run(connector, Some(resume), opts, sink).await
}

async fn run(
    connector: &dyn Connector,
    resume: Option<ResumePoint>,
    opts: &TransferOpts,
    sink: &dyn ProgressSink,
) -> anyhow::Result<RunSummary> {
    let started = Instant::now();

    let mut stores = connector
        .connect()
        .await
        .context("Failed to connect to source and destination stores")?;
    let names = stores
        .0
        .collection_names()
        .await
        .context("Failed to list source collections")?;

    let (names, mut first_offset) = match resume {
        Some(resume) => slice_at_resume(names, resume, sink),
        None => (names, 0),
    };

    sink.emit(&TransferEvent::RunStarted {
        collections: names.len(),
    });

    let mut summaries: Vec<CollectionSummary> = Vec::with_capacity(names.len());
    let mut documents = 0u64;

    for name in &names {
        // The explicit offset applies to the first collection only.
        let offset = std::mem::take(&mut first_offset);
        match transfer_collection(connector, &mut stores, name, offset, opts, sink).await {
            Ok(summary) => {
                documents += summary.transferred;
                summaries.push(summary);
            }
            Err(err) => {
                sink.emit(&TransferEvent::CollectionFailed {
                    collection: err.collection().to_string(),
                    offset: err.offset(),
                    error: err.to_string(),
                });
                // No collection after the failing one is attempted.
                return Err(err.into());
            }
        }
    }

    sink.emit(&TransferEvent::RunCompleted {
        collections: summaries.len(),
        documents,
    });

    Ok(RunSummary {
        collections: summaries,
        documents,
        duration: started.elapsed(),
    })
}

/// Slice the catalog at the resume collection.
///
/// An unknown name falls back to the full list and drops the offset with
/// it: applying a foreign offset to an unrelated collection could skip its
/// documents outright.
fn slice_at_resume(
    names: Vec<String>,
    resume: ResumePoint,
    sink: &dyn ProgressSink,
) -> (Vec<String>, u64) {
    let Some(wanted) = resume.collection.as_deref().filter(|c| !c.is_empty()) else {
        if resume.offset > 0 {
            tracing::debug!(
                "Resume offset {} ignored without a collection name",
                resume.offset
            );
        }
        return (names, 0);
    };

    match names.iter().position(|n| n == wanted) {
        Some(index) => (names[index..].to_vec(), resume.offset),
        None => {
            sink.emit(&TransferEvent::UnknownResumeCollection {
                collection: wanted.to_string(),
            });
            (names, 0)
        }
    }
}
