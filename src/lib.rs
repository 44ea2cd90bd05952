//! mongo-transfer library
//!
//! Copies all documents of all collections from one MongoDB deployment to
//! another, tolerating transient connectivity failures and supporting
//! resumable, idempotent re-runs without losing documents.
//!
//! # Features
//!
//! - Batched transfer: bounded skip/limit scans over a stable `_id` order
//! - Resumable: progress is derived from the destination's own document
//!   counts plus an optional explicit offset - no checkpoint files
//! - Fault tolerant: transient failures reconnect both stores and retry the
//!   same batch a bounded number of times
//! - At-least-once: duplicate-key conflicts from partial writes are
//!   absorbed per document instead of aborting the batch
//!
//! # CLI Usage
//!
//! ```bash
//! # Copy every collection of a database
//! mongo-transfer full \
//!   --source-uri mongodb://src:27017 --source-database StockMarket \
//!   --dest-uri mongodb://dst:27017
//!
//! # Resume an interrupted run from a logged checkpoint
//! mongo-transfer resume \
//!   --source-uri mongodb://src:27017 --source-database StockMarket \
//!   --dest-uri mongodb://dst:27017 \
//!   --collection Trades --offset 700
//! ```

use clap::Parser;
use std::time::Duration;

pub mod batch;
pub mod error;
pub mod migrate;
pub mod report;
pub mod store;
pub mod testing;
pub mod transfer;

pub use batch::{fetch_batch, write_batch, BatchWriteReport};
pub use error::{StoreError, TransferError};
pub use migrate::{run_full, run_resume, ResumePoint, RunSummary};
pub use report::{LogSink, ProgressSink, TransferEvent};
pub use store::mongo::{ConnectOpts, MongoConnector};
pub use store::{Connector, DestCollection, DestStore, SourceCollection, SourceStore};
pub use transfer::{transfer_collection, CollectionSummary, TransferOpts};

#[derive(Parser, Clone, Debug)]
pub struct SourceOpts {
    /// Source MongoDB connection URI
    #[arg(long, env = "MONGO_TRANSFER_SOURCE_URI")]
    pub source_uri: String,

    /// Source database name
    #[arg(long, env = "MONGO_TRANSFER_SOURCE_DATABASE")]
    pub source_database: String,
}

#[derive(Parser, Clone, Debug)]
pub struct DestOpts {
    /// Destination MongoDB connection URI
    #[arg(long, env = "MONGO_TRANSFER_DEST_URI")]
    pub dest_uri: String,

    /// Destination database name (defaults to the source database name)
    #[arg(long, env = "MONGO_TRANSFER_DEST_DATABASE")]
    pub dest_database: Option<String>,
}

#[derive(Parser, Clone, Debug)]
pub struct EngineOpts {
    /// Documents per batch
    #[arg(long, default_value = "500")]
    pub batch_size: usize,

    /// Attempts per batch before the transfer fails
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Seconds to wait before retrying a failed batch
    #[arg(long, default_value = "2")]
    pub retry_backoff_secs: u64,
}

impl EngineOpts {
    pub fn to_transfer_opts(&self) -> TransferOpts {
        TransferOpts {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
            ..TransferOpts::default()
        }
    }
}

impl ConnectOpts {
    /// Build connection options from CLI opts; the destination database
    /// name falls back to the source's.
    pub fn from_cli(source: &SourceOpts, dest: &DestOpts) -> Self {
        ConnectOpts::new(
            &source.source_uri,
            &source.source_database,
            &dest.dest_uri,
            dest.dest_database
                .as_deref()
                .unwrap_or(&source.source_database),
        )
    }
}
