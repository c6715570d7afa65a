//! In-memory storage implementation.
//!
//! Collections are kept in a HashMap behind an async-aware read-write lock; documents
//! of one collection are kept in key order, which is the store order reported by
//! queries.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bson::Bson;
use mea::rwlock::RwLock;
use tracing::debug;
use uuid::Uuid;

use arangolayer_core::{
    backend::{CollectionInfo, Connector, ServerVersion, StoreBackend},
    connection::ConnectionConfig,
    document::{ID_FIELD, IDENTITY_FIELDS, KEY_FIELD, REV_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Filter,
};

use crate::evaluator::DocumentEvaluator;

/// Server name reported by [`InMemoryStore::version`](StoreBackend::version).
pub const SERVER_NAME: &str = "arangolayer-memory";

#[derive(Debug)]
struct CollectionState {
    id: u64,
    documents: BTreeMap<u64, bson::Document>,
}

#[derive(Debug, Default)]
struct StoreState {
    collections: HashMap<String, CollectionState>,
    last_collection_id: u64,
    last_key: u64,
}

impl StoreState {
    fn collection(&self, name: &str) -> DocumentStoreResult<&CollectionState> {
        self.collections
            .get(name)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(name.to_string()))
    }

    fn collection_mut(&mut self, name: &str) -> DocumentStoreResult<&mut CollectionState> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| DocumentStoreError::CollectionNotFound(name.to_string()))
    }

    fn create(&mut self, name: &str) -> DocumentStoreResult<CollectionInfo> {
        if self.collections.contains_key(name) {
            return Err(DocumentStoreError::CollectionAlreadyExists(name.to_string()));
        }

        self.last_collection_id += 1;
        let id = self.last_collection_id;
        self.collections.insert(
            name.to_string(),
            CollectionState { id, documents: BTreeMap::new() },
        );

        Ok(info(name, id))
    }
}

fn info(name: &str, id: u64) -> CollectionInfo {
    CollectionInfo { id: id.to_string(), name: name.to_string() }
}

fn new_revision() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Clones share
/// the same collections and the same reachability switch, so a clone handed out as a
/// connection backend can be inspected and manipulated by the test that created it.
///
/// # Example
///
/// ```ignore
/// use arangolayer_memory::InMemoryStore;
/// use arangolayer::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.create_collection("order").await?;
///
/// let stored = store.insert_document("order", doc! { "total": 42 }).await?;
/// assert_eq!(stored.get_str("_id")?, "order/1");
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    reachable: Arc<AtomicBool>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty, reachable store.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Switches the simulated network on or off. While off, every call fails with
    /// [`DocumentStoreError::Transport`].
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> DocumentStoreResult<()> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(DocumentStoreError::Transport("connect ECONNREFUSED (in-memory store offline)".into()))
        }
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn version(&self) -> DocumentStoreResult<ServerVersion> {
        self.ensure_reachable()?;

        Ok(ServerVersion {
            server: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<CollectionInfo>> {
        self.ensure_reachable()?;

        let state = self.state.read().await;
        let mut collections = state
            .collections
            .iter()
            .map(|(name, collection)| info(name, collection.id))
            .collect::<Vec<_>>();
        collections.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(collections)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<CollectionInfo> {
        self.ensure_reachable()?;

        if name.is_empty() {
            return Err(DocumentStoreError::Backend("illegal name: collection name is empty".into()));
        }

        let created = self.state.write().await.create(name)?;
        debug!(collection = %name, id = %created.id, "Created in-memory collection");

        Ok(created)
    }

    async fn get_collection(&self, name: &str) -> DocumentStoreResult<Option<CollectionInfo>> {
        self.ensure_reachable()?;

        Ok(self
            .state
            .read()
            .await
            .collections
            .get(name)
            .map(|collection| info(name, collection.id)))
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: bson::Document,
    ) -> DocumentStoreResult<bson::Document> {
        self.ensure_reachable()?;

        let mut state = self.state.write().await;
        // fail before consuming a key
        state.collection(collection)?;

        state.last_key += 1;
        let key = state.last_key;

        let mut stored = bson::Document::new();
        stored.insert(KEY_FIELD, key.to_string());
        stored.insert(ID_FIELD, format!("{collection}/{key}"));
        stored.insert(REV_FIELD, new_revision());
        for (field, value) in document {
            if !IDENTITY_FIELDS.contains(&field.as_str()) {
                stored.insert(field, value);
            }
        }

        state
            .collection_mut(collection)?
            .documents
            .insert(key, stored.clone());

        Ok(stored)
    }

    async fn get_document(
        &self,
        collection: &str,
        key: &str,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        self.ensure_reachable()?;

        let state = self.state.read().await;
        let documents = &state.collection(collection)?.documents;

        Ok(key
            .parse::<u64>()
            .ok()
            .and_then(|key| documents.get(&key))
            .cloned())
    }

    async fn update_document(
        &self,
        collection: &str,
        key: &str,
        patch: bson::Document,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        self.ensure_reachable()?;

        let mut state = self.state.write().await;
        let documents = &mut state.collection_mut(collection)?.documents;

        let Some(existing) = key.parse::<u64>().ok().and_then(|key| documents.get_mut(&key)) else {
            return Ok(None);
        };

        for (field, value) in patch {
            if !IDENTITY_FIELDS.contains(&field.as_str()) {
                existing.insert(field, value);
            }
        }
        existing.insert(REV_FIELD, Bson::String(new_revision()));

        Ok(Some(existing.clone()))
    }

    async fn delete_document(&self, collection: &str, key: &str) -> DocumentStoreResult<bool> {
        self.ensure_reachable()?;

        let mut state = self.state.write().await;
        let documents = &mut state.collection_mut(collection)?.documents;

        Ok(key
            .parse::<u64>()
            .ok()
            .and_then(|key| documents.remove(&key))
            .is_some())
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> DocumentStoreResult<Vec<bson::Document>> {
        self.ensure_reachable()?;

        let state = self.state.read().await;

        Ok(state
            .collection(collection)?
            .documents
            .values()
            .filter(|document| DocumentEvaluator::matches(document, filter))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        self.ensure_reachable()?;

        let state = self.state.read().await;
        let count = state
            .collection(collection)?
            .documents
            .values()
            .filter(|document| DocumentEvaluator::matches(document, filter))
            .count();

        Ok(count as u64)
    }
}

/// Hands out clones of the store for any endpoint, so every handle established through
/// it shares the same data.
#[async_trait]
impl Connector for InMemoryStore {
    type Backend = InMemoryStore;

    async fn connect(&self, endpoint: &str, config: &ConnectionConfig) -> DocumentStoreResult<Self::Backend> {
        debug!(endpoint, database = config.database_name(), "Opening in-memory store");

        Ok(self.clone())
    }
}

/// Builder for [`InMemoryStore`] instances with pre-created collections.
///
/// ```ignore
/// use arangolayer_memory::InMemoryStore;
///
/// let store = InMemoryStore::builder()
///     .collection("order")
///     .unreachable()
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<String>,
    unreachable: bool,
}

impl InMemoryStoreBuilder {
    /// Pre-creates a collection. Repeated names are created once.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    /// Starts the store with its reachability switch off.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn build(self) -> InMemoryStore {
        let mut state = StoreState::default();
        for name in &self.collections {
            // duplicates are fine here
            let _ = state.create(name);
        }

        InMemoryStore {
            state: Arc::new(RwLock::new(state)),
            reachable: Arc::new(AtomicBool::new(!self.unreachable)),
        }
    }
}
