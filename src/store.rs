//! Store handle seams.
//!
//! The engine talks to both databases exclusively through these traits:
//! an ordered, offset-based scan and a count on the source side; counts and
//! best-effort inserts on the destination side. [`Connector`] is the
//! reconnect seam - the controller holds handle pairs as replaceable local
//! state and swaps in a fresh pair on every retry cycle, never keeping a
//! global connection.
//!
//! Implementations classify their failures into [`StoreError`] at this
//! boundary so the retry policy upstream stays store-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use bson::Document;

use crate::error::StoreError;

pub mod mongo;

pub type StoreResult<T> = Result<T, StoreError>;

/// Read side of one named collection.
#[async_trait]
pub trait SourceCollection: Send + Sync {
    /// Number of documents currently in the collection.
    async fn count(&self) -> StoreResult<u64>;

    /// Up to `limit` documents starting at `offset` in a stable ascending
    /// order. An empty result means no documents remain at or beyond
    /// `offset`. `max_time` caps server-side execution of the scan.
    async fn scan(
        &self,
        offset: u64,
        limit: usize,
        max_time: Duration,
    ) -> StoreResult<Vec<Document>>;
}

/// Write side of one named collection.
#[async_trait]
pub trait DestCollection: Send + Sync {
    /// Number of documents currently in the collection.
    async fn count(&self) -> StoreResult<u64>;

    /// Unordered bulk insert: one failing document must not block insertion
    /// of the others in the same batch.
    async fn bulk_insert(&self, docs: &[Document]) -> StoreResult<()>;

    /// Insert a single document.
    async fn insert_one(&self, doc: &Document) -> StoreResult<()>;
}

/// A connected source database.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Collection names in catalog order.
    async fn collection_names(&self) -> StoreResult<Vec<String>>;

    fn collection(&self, name: &str) -> Box<dyn SourceCollection>;
}

/// A connected destination database.
pub trait DestStore: Send + Sync {
    fn collection(&self, name: &str) -> Box<dyn DestCollection>;
}

/// Builds fresh store handle pairs.
///
/// Each call establishes new connections to both databases; handles from
/// earlier calls stay independent and are released when dropped.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> StoreResult<(Box<dyn SourceStore>, Box<dyn DestStore>)>;
}
