//! In-memory store doubles for exercising the transfer engine in tests.
//!
//! [`MemoryConnector`] hands out fresh views over shared collection data,
//! the way a real reconnect produces new clients over the same database. A
//! failure script injects transient errors at chosen operations, and call
//! counters let tests assert how often the engine touched each store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Bson, Document};

use crate::error::StoreError;
use crate::report::{ProgressSink, TransferEvent};
use crate::store::{
    Connector, DestCollection, DestStore, SourceCollection, SourceStore, StoreResult,
};

/// Build `count` documents with sequential `_id`s starting at `start`.
pub fn sequential_docs(start: i64, count: i64) -> Vec<Document> {
    (start..start + count)
        .map(|i| doc! { "_id": i, "seq": i })
        .collect()
}

/// Collection contents in catalog (insertion) order.
#[derive(Default)]
struct MemoryData {
    collections: Vec<(String, Vec<Document>)>,
}

impl MemoryData {
    fn docs(&self, name: &str) -> Option<&Vec<Document>> {
        self.collections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, docs)| docs)
    }

    fn docs_mut(&mut self, name: &str) -> &mut Vec<Document> {
        if let Some(index) = self.collections.iter().position(|(n, _)| n == name) {
            return &mut self.collections[index].1;
        }
        self.collections.push((name.to_string(), Vec::new()));
        &mut self
            .collections
            .last_mut()
            .expect("collection was just pushed")
            .1
    }
}

/// Pending scripted failures and call counters.
#[derive(Default)]
struct ScriptState {
    scan_failures: u32,
    bulk_insert_failures: u32,
    connect_failures: u32,
    scan_calls: u32,
    bulk_insert_calls: u32,
    insert_one_calls: u32,
    connects: u32,
    /// After this many further scans, truncate the scanned source
    /// collection to the given length.
    shrink_after_scans: Option<(u32, usize)>,
}

/// Connector over in-memory source and destination databases.
#[derive(Default)]
pub struct MemoryConnector {
    source: Arc<Mutex<MemoryData>>,
    dest: Arc<Mutex<MemoryData>>,
    script: Arc<Mutex<ScriptState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        MemoryConnector::default()
    }

    pub fn with_source_collection(self, name: &str, docs: Vec<Document>) -> Self {
        *self.source.lock().unwrap().docs_mut(name) = docs;
        self
    }

    pub fn with_dest_collection(self, name: &str, docs: Vec<Document>) -> Self {
        *self.dest.lock().unwrap().docs_mut(name) = docs;
        self
    }

    /// Arm `n` transient failures on upcoming scans.
    pub fn fail_next_scans(&self, n: u32) {
        self.script.lock().unwrap().scan_failures = n;
    }

    /// Arm `n` transient failures on upcoming bulk inserts.
    pub fn fail_next_bulk_inserts(&self, n: u32) {
        self.script.lock().unwrap().bulk_insert_failures = n;
    }

    /// Arm `n` transient failures on upcoming connect calls.
    pub fn fail_next_connects(&self, n: u32) {
        self.script.lock().unwrap().connect_failures = n;
    }

    /// After `scans` further scans, truncate the scanned source collection
    /// to `remaining` documents.
    pub fn shrink_source_after_scans(&self, scans: u32, remaining: usize) {
        self.script.lock().unwrap().shrink_after_scans = Some((scans, remaining));
    }

    pub fn connects(&self) -> u32 {
        self.script.lock().unwrap().connects
    }

    pub fn scan_calls(&self) -> u32 {
        self.script.lock().unwrap().scan_calls
    }

    pub fn bulk_insert_calls(&self) -> u32 {
        self.script.lock().unwrap().bulk_insert_calls
    }

    pub fn insert_one_calls(&self) -> u32 {
        self.script.lock().unwrap().insert_one_calls
    }

    pub fn dest_count(&self, name: &str) -> u64 {
        self.dest
            .lock()
            .unwrap()
            .docs(name)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0)
    }

    pub fn dest_documents(&self, name: &str) -> Vec<Document> {
        self.dest
            .lock()
            .unwrap()
            .docs(name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> StoreResult<(Box<dyn SourceStore>, Box<dyn DestStore>)> {
        let mut script = self.script.lock().unwrap();
        script.connects += 1;
        if script.connect_failures > 0 {
            script.connect_failures -= 1;
            return Err(StoreError::Transient(anyhow::anyhow!(
                "scripted connect failure"
            )));
        }
        drop(script);

        Ok((
            Box::new(MemorySource {
                data: Arc::clone(&self.source),
                script: Arc::clone(&self.script),
            }),
            Box::new(MemoryDest {
                data: Arc::clone(&self.dest),
                script: Arc::clone(&self.script),
            }),
        ))
    }
}

struct MemorySource {
    data: Arc<Mutex<MemoryData>>,
    script: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .collections
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn collection(&self, name: &str) -> Box<dyn SourceCollection> {
        Box::new(MemorySourceCollection {
            name: name.to_string(),
            data: Arc::clone(&self.data),
            script: Arc::clone(&self.script),
        })
    }
}

struct MemorySourceCollection {
    name: String,
    data: Arc<Mutex<MemoryData>>,
    script: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl SourceCollection for MemorySourceCollection {
    async fn count(&self) -> StoreResult<u64> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .docs(&self.name)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn scan(
        &self,
        offset: u64,
        limit: usize,
        _max_time: Duration,
    ) -> StoreResult<Vec<Document>> {
        {
            let mut script = self.script.lock().unwrap();
            script.scan_calls += 1;
            if script.scan_failures > 0 {
                script.scan_failures -= 1;
                return Err(StoreError::Transient(anyhow::anyhow!(
                    "scripted scan failure"
                )));
            }
        }

        let docs: Vec<Document> = self
            .data
            .lock()
            .unwrap()
            .docs(&self.name)
            .map(|docs| {
                docs.iter()
                    .skip(offset as usize)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut script = self.script.lock().unwrap();
        if let Some((remaining, len)) = script.shrink_after_scans {
            if remaining <= 1 {
                script.shrink_after_scans = None;
                self.data.lock().unwrap().docs_mut(&self.name).truncate(len);
            } else {
                script.shrink_after_scans = Some((remaining - 1, len));
            }
        }

        Ok(docs)
    }
}

struct MemoryDest {
    data: Arc<Mutex<MemoryData>>,
    script: Arc<Mutex<ScriptState>>,
}

impl DestStore for MemoryDest {
    fn collection(&self, name: &str) -> Box<dyn DestCollection> {
        Box::new(MemoryDestCollection {
            name: name.to_string(),
            data: Arc::clone(&self.data),
            script: Arc::clone(&self.script),
        })
    }
}

struct MemoryDestCollection {
    name: String,
    data: Arc<Mutex<MemoryData>>,
    script: Arc<Mutex<ScriptState>>,
}

fn id_of(doc: &Document) -> Option<&Bson> {
    doc.get("_id")
}

fn contains_id(existing: &[Document], doc: &Document) -> bool {
    match id_of(doc) {
        Some(id) => existing.iter().any(|d| id_of(d) == Some(id)),
        None => false,
    }
}

#[async_trait]
impl DestCollection for MemoryDestCollection {
    async fn count(&self) -> StoreResult<u64> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .docs(&self.name)
            .map(|docs| docs.len() as u64)
            .unwrap_or(0))
    }

    async fn bulk_insert(&self, docs: &[Document]) -> StoreResult<()> {
        {
            let mut script = self.script.lock().unwrap();
            script.bulk_insert_calls += 1;
            if script.bulk_insert_failures > 0 {
                script.bulk_insert_failures -= 1;
                return Err(StoreError::Transient(anyhow::anyhow!(
                    "scripted bulk insert failure"
                )));
            }
        }

        // Unordered semantics: conflicting documents are skipped, the rest
        // land, and the call still reports the failure.
        let mut data = self.data.lock().unwrap();
        let existing = data.docs_mut(&self.name);
        let mut conflicts = 0usize;
        for doc in docs {
            if contains_id(existing, doc) {
                conflicts += 1;
            } else {
                existing.push(doc.clone());
            }
        }
        if conflicts > 0 {
            return Err(StoreError::Write(anyhow::anyhow!(
                "{conflicts} duplicate documents in bulk insert"
            )));
        }
        Ok(())
    }

    async fn insert_one(&self, doc: &Document) -> StoreResult<()> {
        self.script.lock().unwrap().insert_one_calls += 1;

        let mut data = self.data.lock().unwrap();
        let existing = data.docs_mut(&self.name);
        if contains_id(existing, doc) {
            return Err(StoreError::Duplicate(format!(
                "duplicate _id {:?}",
                id_of(doc)
            )));
        }
        existing.push(doc.clone());
        Ok(())
    }
}

/// Captures every emitted event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Cursor advancements recorded for one collection, in order.
    pub fn batch_deltas(&self, collection: &str) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransferEvent::BatchTransferred {
                    collection: c,
                    delta,
                    ..
                } if c == collection => Some(delta),
                _ => None,
            })
            .collect()
    }

    /// Checkpoint offsets recorded for one collection, in order.
    pub fn checkpoints(&self, collection: &str) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransferEvent::Checkpoint {
                    collection: c,
                    offset,
                    ..
                } if c == collection => Some(offset),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: &TransferEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
