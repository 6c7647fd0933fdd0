//! Document store collaborator.
//!
//! Listings live in a document store addressed by slash-separated collection
//! paths (`artifacts/{app_id}/public/data/cars`). The [`DocumentStore`] trait
//! is the seam: the admin panel and the storefront feed only talk to it.
//!
//! [`MemoryStore`] is the in-process implementation. It keeps every
//! collection in memory, optionally mirrors them to a JSON file, and pushes a
//! full snapshot to each subscriber on subscribe and after every mutation.
//!
//! ## Subscriptions
//!
//! `subscribe` returns a [`Subscription`] guard. Dropping it detaches the
//! listener. Snapshots are delivered in commit order: a writer holds the
//! delivery lock from commit until every listener has seen its snapshot.
//! Callbacks run with the data lock released, so they may read the store,
//! but a callback must not write to it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No document {id} in {collection}")]
    NotFound { collection: String, id: String },
    #[error("Invalid collection path: {0}")]
    InvalidPath(String),
    #[error("Documents must be JSON objects")]
    InvalidRecord,
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A stored record and its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

pub type SnapshotCallback = Box<dyn Fn(Vec<Document>) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(StoreError) + Send + Sync>;

/// Detaches a listener when dropped.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A subscription with nothing to detach, e.g. one that failed to start.
    pub fn detached() -> Self {
        Self { detach: None }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

/// Persistence and change notification for listings.
pub trait DocumentStore: Send + Sync {
    /// Watch a collection. `on_update` gets the full snapshot now and after
    /// every change; `on_error` gets a failure to start or keep watching.
    fn subscribe(
        &self,
        collection: &str,
        on_update: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Subscription;

    /// One-shot read of a collection.
    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Add a record, returning its generated id.
    fn create(&self, collection: &str, record: Value) -> Result<String, StoreError>;

    /// Merge the top-level fields of `partial` into an existing record.
    fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError>;

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// The listings collection for an app.
pub fn collection_path(app_id: &str) -> String {
    format!("artifacts/{app_id}/public/data/cars")
}

/// Collection paths alternate collection/document segments and end on a
/// collection, so they have an odd number of non-empty segments.
fn validate_collection(path: &str) -> Result<(), StoreError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) || segments.len() % 2 == 0 {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

type Collections = BTreeMap<String, Vec<Document>>;

struct Listener {
    id: u64,
    collection: String,
    on_update: Arc<dyn Fn(Vec<Document>) + Send + Sync>,
}

#[derive(Default)]
struct Inner {
    collections: Collections,
    listeners: Vec<Listener>,
    next_listener: u64,
}

/// On-disk layout of a persisted store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    collections: Collections,
}

/// In-process [`DocumentStore`], optionally backed by a JSON file.
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    /// Held from commit to the end of delivery. Always taken before `inner`.
    delivery: Mutex<()>,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A purely in-memory store.
    pub fn new() -> Self {
        Self::with_collections(Collections::new(), None)
    }

    /// A store persisted to `path`, loading it if it exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let collections = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let file: StoreFile = serde_json::from_str(&content)?;
            file.collections
        } else {
            Collections::new()
        };
        tracing::debug!(
            path = %path.display(),
            collections = collections.len(),
            "opened document store"
        );
        Ok(Self::with_collections(collections, Some(path.to_path_buf())))
    }

    fn with_collections(collections: Collections, path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                collections,
                ..Default::default()
            })),
            delivery: Mutex::new(()),
            path,
        }
    }

    /// Number of attached listeners across all collections.
    pub fn listener_count(&self) -> usize {
        self.lock().map(|inner| inner.listeners.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }

    /// A panicking listener must not wedge every later writer.
    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, collections: &Collections) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = StoreFile {
            collections: collections.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!(".{name}.tmp-{}", Uuid::new_v4()));
        if let Err(err) = std::fs::write(&tmp, content) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io(err));
        }
        if let Err(err) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io(err));
        }
        Ok(())
    }

    /// Apply `change` to a copy of the collections, persist the copy, then
    /// commit it and notify the collection's listeners.
    fn mutate<T>(
        &self,
        collection: &str,
        change: impl FnOnce(&mut Vec<Document>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        validate_collection(collection)?;
        let _delivery = self.lock_delivery();
        let (result, snapshot, listeners) = {
            let mut inner = self.lock()?;
            let mut next = inner.collections.clone();
            let docs = next.entry(collection.to_string()).or_default();
            let result = change(docs)?;
            let snapshot = docs.clone();
            self.persist(&next)?;
            inner.collections = next;
            let listeners: Vec<_> = inner
                .listeners
                .iter()
                .filter(|l| l.collection == collection)
                .map(|l| Arc::clone(&l.on_update))
                .collect();
            (result, snapshot, listeners)
        };
        for listener in listeners {
            listener(snapshot.clone());
        }
        Ok(result)
    }
}

/// 20 random hex characters.
fn generate_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(20);
    id
}

fn detach_listener(inner: &Weak<Mutex<Inner>>, id: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if let Ok(mut inner) = inner.lock() {
        inner.listeners.retain(|l| l.id != id);
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(
        &self,
        collection: &str,
        on_update: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        if let Err(e) = validate_collection(collection) {
            on_error(e);
            return Subscription::detached();
        }
        let on_update: Arc<dyn Fn(Vec<Document>) + Send + Sync> = Arc::from(on_update);

        let delivery = self.lock_delivery();
        let (id, snapshot) = match self.lock() {
            Ok(mut inner) => {
                let id = inner.next_listener;
                inner.next_listener += 1;
                inner.listeners.push(Listener {
                    id,
                    collection: collection.to_string(),
                    on_update: Arc::clone(&on_update),
                });
                let snapshot = inner.collections.get(collection).cloned().unwrap_or_default();
                (id, snapshot)
            }
            Err(e) => {
                on_error(e);
                return Subscription::detached();
            }
        };

        on_update(snapshot);
        drop(delivery);

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || detach_listener(&weak, id))
    }

    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        validate_collection(collection)?;
        let inner = self.lock()?;
        Ok(inner.collections.get(collection).cloned().unwrap_or_default())
    }

    fn create(&self, collection: &str, record: Value) -> Result<String, StoreError> {
        if !record.is_object() {
            return Err(StoreError::InvalidRecord);
        }
        let id = generate_id();
        let doc_id = id.clone();
        self.mutate(collection, move |docs| {
            docs.push(Document {
                id: doc_id,
                data: record,
            });
            Ok(())
        })?;
        tracing::info!(collection, %id, "created document");
        Ok(id)
    }

    fn update(&self, collection: &str, id: &str, partial: Value) -> Result<(), StoreError> {
        let Value::Object(fields) = partial else {
            return Err(StoreError::InvalidRecord);
        };
        self.mutate(collection, |docs| {
            let doc = docs
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })?;
            if !doc.data.is_object() {
                doc.data = Value::Object(Map::new());
            }
            if let Value::Object(target) = &mut doc.data {
                target.extend(fields);
            }
            Ok(())
        })?;
        tracing::info!(collection, id, "updated document");
        Ok(())
    }

    fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.mutate(collection, |docs| {
            let before = docs.len();
            docs.retain(|d| d.id != id);
            if docs.len() == before {
                return Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })?;
        tracing::info!(collection, id, "deleted document");
        Ok(())
    }
}
