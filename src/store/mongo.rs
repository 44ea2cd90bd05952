//! MongoDB-backed store handles.
//!
//! Wraps the driver behind the store traits and maps driver errors onto the
//! retry taxonomy. Scans are pinned to an ascending `_id` sort so offsets
//! stay meaningful across reconnects regardless of the collection's natural
//! order.

use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Document};
use futures::stream::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, InsertManyOptions};
use mongodb::{Client, Collection, Database};

use crate::error::StoreError;
use crate::store::{
    Connector, DestCollection, DestStore, SourceCollection, SourceStore, StoreResult,
};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Connection tuning applied to both clients.
#[derive(Debug, Clone)]
pub struct ConnectOpts {
    pub source_uri: String,
    pub source_database: String,
    pub dest_uri: String,
    pub dest_database: String,
    /// How long to wait for a suitable server before giving up.
    pub server_selection_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_pool_size: u32,
    pub retry_writes: bool,
}

impl ConnectOpts {
    pub fn new(
        source_uri: impl Into<String>,
        source_database: impl Into<String>,
        dest_uri: impl Into<String>,
        dest_database: impl Into<String>,
    ) -> Self {
        ConnectOpts {
            source_uri: source_uri.into(),
            source_database: source_database.into(),
            dest_uri: dest_uri.into(),
            dest_database: dest_database.into(),
            server_selection_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            max_pool_size: 10,
            retry_writes: true,
        }
    }
}

/// Creates independent client pairs.
///
/// Every [`Connector::connect`] call builds two new clients, so a retry
/// cycle replaces both connection pools wholesale; the previous clients are
/// released when their handles drop.
pub struct MongoConnector {
    opts: ConnectOpts,
}

impl MongoConnector {
    pub fn new(opts: ConnectOpts) -> Self {
        MongoConnector { opts }
    }

    async fn client(&self, uri: &str) -> StoreResult<Client> {
        let mut options = ClientOptions::parse(uri).await.map_err(classify)?;
        options.server_selection_timeout = Some(self.opts.server_selection_timeout);
        options.connect_timeout = Some(self.opts.connect_timeout);
        options.max_pool_size = Some(self.opts.max_pool_size);
        options.retry_writes = Some(self.opts.retry_writes);
        Client::with_options(options).map_err(classify)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self) -> StoreResult<(Box<dyn SourceStore>, Box<dyn DestStore>)> {
        tracing::debug!("Connecting to source at {}", self.opts.source_uri);
        let source = self.client(&self.opts.source_uri).await?;
        tracing::debug!("Connecting to destination at {}", self.opts.dest_uri);
        let dest = self.client(&self.opts.dest_uri).await?;

        Ok((
            Box::new(MongoSource {
                db: source.database(&self.opts.source_database),
            }),
            Box::new(MongoDest {
                db: dest.database(&self.opts.dest_database),
            }),
        ))
    }
}

struct MongoSource {
    db: Database,
}

#[async_trait]
impl SourceStore for MongoSource {
    async fn collection_names(&self) -> StoreResult<Vec<String>> {
        self.db.list_collection_names().await.map_err(classify)
    }

    fn collection(&self, name: &str) -> Box<dyn SourceCollection> {
        Box::new(MongoSourceCollection {
            inner: self.db.collection::<Document>(name),
        })
    }
}

struct MongoDest {
    db: Database,
}

impl DestStore for MongoDest {
    fn collection(&self, name: &str) -> Box<dyn DestCollection> {
        Box::new(MongoDestCollection {
            inner: self.db.collection::<Document>(name),
        })
    }
}

struct MongoSourceCollection {
    inner: Collection<Document>,
}

#[async_trait]
impl SourceCollection for MongoSourceCollection {
    async fn count(&self) -> StoreResult<u64> {
        self.inner.count_documents(doc! {}).await.map_err(classify)
    }

    async fn scan(
        &self,
        offset: u64,
        limit: usize,
        max_time: Duration,
    ) -> StoreResult<Vec<Document>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .skip(offset)
            .limit(limit as i64)
            .max_time(max_time)
            .build();
        let cursor = self
            .inner
            .find(doc! {})
            .with_options(options)
            .await
            .map_err(classify)?;
        cursor.try_collect().await.map_err(classify)
    }
}

struct MongoDestCollection {
    inner: Collection<Document>,
}

#[async_trait]
impl DestCollection for MongoDestCollection {
    async fn count(&self) -> StoreResult<u64> {
        self.inner.count_documents(doc! {}).await.map_err(classify)
    }

    async fn bulk_insert(&self, docs: &[Document]) -> StoreResult<()> {
        let options = InsertManyOptions::builder().ordered(false).build();
        self.inner
            .insert_many(docs)
            .with_options(options)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn insert_one(&self, doc: &Document) -> StoreResult<()> {
        self.inner
            .insert_one(doc)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Map a driver error onto the retry taxonomy.
fn classify(err: mongodb::error::Error) -> StoreError {
    if is_duplicate_key(&err) {
        return StoreError::Duplicate(err.to_string());
    }
    if matches!(
        &*err.kind,
        ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Command(_)
            | ErrorKind::Authentication { .. }
    ) {
        return StoreError::Transient(err.into());
    }
    if matches!(
        &*err.kind,
        ErrorKind::Write(_) | ErrorKind::InsertMany(_) | ErrorKind::BulkWrite(_)
    ) {
        return StoreError::Write(err.into());
    }
    StoreError::Other(err.into())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}
