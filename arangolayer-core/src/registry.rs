//! Model registration.
//!
//! A [`ModelRegistry`] binds logical model names to physical collections. Binding makes
//! sure the collection exists, creating it when it does not, and is idempotent: binding
//! the same definition again reuses the existing collection. Each definition of a batch
//! succeeds or fails on its own.
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::prelude::*;
//!
//! let registry = ModelRegistry::new(handle.clone());
//! let models = registry
//!     .register([
//!         ModelDefinition::new("Order", ModelSchema::new().field("total", FieldKind::Number)),
//!         ModelDefinition::new("Customer", ModelSchema::new()).collection("customers"),
//!     ])
//!     .await;
//!
//! let orders: Repository<Order> = models.get("Order").unwrap().repository();
//! ```

use std::collections::{BTreeMap, btree_map::Entry};

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::{
    backend::{CollectionInfo, StoreBackend},
    connection::ConnectionHandle,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    repository::Repository,
    schema::ModelSchema,
};

/// Declaration of a model: logical name, schema and optional physical collection name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    name: String,
    schema: ModelSchema,
    collection: Option<String>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, schema: ModelSchema) -> Self {
        Self { name: name.into(), schema, collection: None }
    }

    /// Overrides the physical collection name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// The explicit collection name, or the lowercase logical name.
    pub fn collection_name(&self) -> String {
        self.collection
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }
}

/// A model bound to an existing collection.
#[derive(Debug, Clone)]
pub struct BoundModel {
    name: String,
    collection: CollectionInfo,
    schema: ModelSchema,
    handle: ConnectionHandle,
}

impl BoundModel {
    /// Logical model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self) -> &CollectionInfo {
        &self.collection
    }

    pub fn collection_name(&self) -> &str {
        &self.collection.name
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Creates a repository over this model's collection.
    pub fn repository<T: Document>(&self) -> Repository<T> {
        Repository::from_model(self)
    }
}

/// Outcome of a [`ModelRegistry::register`] call, keyed by logical model name.
#[derive(Debug)]
pub struct Registrations {
    entries: BTreeMap<String, DocumentStoreResult<BoundModel>>,
}

impl Registrations {
    /// The bound model for `name`, if its registration succeeded.
    pub fn get(&self, name: &str) -> Option<&BoundModel> {
        self.entries.get(name).and_then(|entry| entry.as_ref().ok())
    }

    /// The error for `name`, if its registration failed.
    pub fn error(&self, name: &str) -> Option<&DocumentStoreError> {
        self.entries.get(name).and_then(|entry| entry.as_ref().err())
    }

    /// Removes and returns the outcome for `name`.
    pub fn take(&mut self, name: &str) -> Option<DocumentStoreResult<BoundModel>> {
        self.entries.remove(name)
    }

    pub fn models(&self) -> impl Iterator<Item = &BoundModel> {
        self.entries.values().filter_map(|entry| entry.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DocumentStoreError)> {
        self.entries
            .iter()
            .filter_map(|(name, entry)| entry.as_ref().err().map(|err| (name.as_str(), err)))
    }

    /// Returns `true` if every definition was bound.
    pub fn is_complete(&self) -> bool {
        self.entries.values().all(Result::is_ok)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All bound models, or the first failure in name order.
    pub fn into_result(self) -> DocumentStoreResult<BTreeMap<String, BoundModel>> {
        self.entries
            .into_iter()
            .map(|(name, entry)| entry.map(|model| (name, model)))
            .collect()
    }
}

/// Binds model definitions against a connection handle.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    handle: Option<ConnectionHandle>,
}

impl ModelRegistry {
    /// Creates a registry. A registry without a handle fails every registration with
    /// [`DocumentStoreError::Configuration`].
    pub fn new(handle: impl Into<Option<ConnectionHandle>>) -> Self {
        Self { handle: handle.into() }
    }

    /// Binds every definition, concurrently and independently.
    ///
    /// A logical name listed twice with identical definitions is bound once. Conflicting
    /// definitions for the same name fail that name.
    pub async fn register(
        &self,
        definitions: impl IntoIterator<Item = ModelDefinition>,
    ) -> Registrations {
        let mut unique: BTreeMap<String, ModelDefinition> = BTreeMap::new();
        let mut entries: BTreeMap<String, DocumentStoreResult<BoundModel>> = BTreeMap::new();

        for definition in definitions {
            match unique.entry(definition.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(definition);
                }
                Entry::Occupied(slot) if slot.get() == &definition => {}
                Entry::Occupied(slot) => {
                    let (name, _) = slot.remove_entry();
                    warn!(model = %name, "Conflicting definitions for model");
                    entries.insert(
                        name.clone(),
                        Err(DocumentStoreError::Configuration(format!(
                            "conflicting definitions for model {name}"
                        ))
                        .in_registration(name)),
                    );
                }
            }
        }
        // a name that conflicted once stays failed even if a later definition matches
        unique.retain(|name, _| !entries.contains_key(name));

        let Some(handle) = &self.handle else {
            warn!(models = unique.len(), "No database connection available for model registration");
            entries.extend(unique.into_keys().map(|name| {
                (
                    name,
                    Err(DocumentStoreError::Configuration(
                        "No database connection available".into(),
                    )),
                )
            }));
            return Registrations { entries };
        };

        let outcomes = join_all(
            unique
                .into_values()
                .map(|definition| Self::bind(handle, definition)),
        )
        .await;

        entries.extend(outcomes);

        Registrations { entries }
    }

    /// Binds a single definition.
    pub async fn register_one(&self, definition: ModelDefinition) -> DocumentStoreResult<BoundModel> {
        let name = definition.name.clone();

        self.register([definition])
            .await
            .take(&name)
            .unwrap_or_else(|| {
                Err(DocumentStoreError::Configuration(format!("model {name} was not registered")))
            })
    }

    async fn bind(
        handle: &ConnectionHandle,
        definition: ModelDefinition,
    ) -> (String, DocumentStoreResult<BoundModel>) {
        let collection_name = definition.collection_name();
        let ModelDefinition { name, schema, .. } = definition;

        let outcome = match ensure_collection(handle.backend(), &collection_name).await {
            Ok(collection) => {
                info!(model = %name, collection = %collection.name, "Registered model");
                Ok(BoundModel {
                    name: name.clone(),
                    collection,
                    schema,
                    handle: handle.clone(),
                })
            }
            Err(err) => {
                warn!(model = %name, collection = %collection_name, error = %err, "Failed to register model");
                Err(err.in_registration(name.clone()))
            }
        };

        (name, outcome)
    }
}

/// Returns the collection named `name`, creating it if it is not listed.
///
/// A create that loses a race against another creator is resolved by fetching the
/// collection that won.
async fn ensure_collection(backend: &dyn StoreBackend, name: &str) -> DocumentStoreResult<CollectionInfo> {
    if let Some(existing) = backend
        .list_collections()
        .await?
        .into_iter()
        .find(|collection| collection.name == name)
    {
        return Ok(existing);
    }

    match backend.create_collection(name).await {
        Ok(created) => {
            info!(collection = %name, "Created new collection");
            Ok(created)
        }
        Err(err) if err.is_already_exists() => {
            debug!(collection = %name, "Collection was created concurrently, reusing it");
            backend
                .get_collection(name)
                .await?
                .ok_or_else(|| DocumentStoreError::CollectionNotFound(name.to_string()))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{Connector, ServerVersion},
        connection::{ConnectionConfig, ConnectionManager},
        query::Filter,
        schema::FieldKind,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    /// Collection-only store. `stale_listing` hides collections from `list_collections`,
    /// which is what a creator that lost a race observes.
    #[derive(Debug, Clone, Default)]
    struct CollectionsOnly {
        collections: Arc<Mutex<Vec<CollectionInfo>>>,
        creates: Arc<Mutex<usize>>,
        stale_listing: bool,
        failing: Option<&'static str>,
    }

    impl CollectionsOnly {
        fn creates(&self) -> usize {
            *self.creates.lock().unwrap()
        }
    }

    #[async_trait]
    impl StoreBackend for CollectionsOnly {
        async fn version(&self) -> DocumentStoreResult<ServerVersion> {
            Ok(ServerVersion { server: "fake".into(), version: "1.0".into() })
        }

        async fn list_collections(&self) -> DocumentStoreResult<Vec<CollectionInfo>> {
            if self.failing == Some("*") {
                return Err(DocumentStoreError::Backend("listing refused".into()));
            }
            if self.stale_listing {
                return Ok(vec![]);
            }
            Ok(self.collections.lock().unwrap().clone())
        }

        async fn create_collection(&self, name: &str) -> DocumentStoreResult<CollectionInfo> {
            if self.failing == Some(name) {
                return Err(DocumentStoreError::Backend(format!("cannot create {name}")));
            }
            let mut collections = self.collections.lock().unwrap();
            if collections.iter().any(|c| c.name == name) {
                return Err(DocumentStoreError::CollectionAlreadyExists(name.to_string()));
            }
            *self.creates.lock().unwrap() += 1;
            let info = CollectionInfo { id: collections.len().to_string(), name: name.to_string() };
            collections.push(info.clone());
            Ok(info)
        }

        async fn get_collection(&self, name: &str) -> DocumentStoreResult<Option<CollectionInfo>> {
            Ok(self.collections.lock().unwrap().iter().find(|c| c.name == name).cloned())
        }

        async fn insert_document(&self, _: &str, _: bson::Document) -> DocumentStoreResult<bson::Document> {
            Err(DocumentStoreError::Backend("unsupported".into()))
        }

        async fn get_document(&self, _: &str, _: &str) -> DocumentStoreResult<Option<bson::Document>> {
            Ok(None)
        }

        async fn update_document(&self, _: &str, _: &str, _: bson::Document) -> DocumentStoreResult<Option<bson::Document>> {
            Ok(None)
        }

        async fn delete_document(&self, _: &str, _: &str) -> DocumentStoreResult<bool> {
            Ok(false)
        }

        async fn find_documents(&self, _: &str, _: &Filter, _: Option<usize>) -> DocumentStoreResult<Vec<bson::Document>> {
            Ok(vec![])
        }

        async fn count_documents(&self, _: &str, _: &Filter) -> DocumentStoreResult<u64> {
            Ok(0)
        }
    }

    #[async_trait]
    impl Connector for CollectionsOnly {
        type Backend = CollectionsOnly;

        async fn connect(&self, _: &str, _: &ConnectionConfig) -> DocumentStoreResult<Self::Backend> {
            Ok(self.clone())
        }
    }

    async fn handle_for(store: &CollectionsOnly) -> ConnectionHandle {
        ConnectionManager::new(store.clone())
            .establish(&ConnectionConfig::new("fake://"))
            .await
            .unwrap()
    }

    fn order() -> ModelDefinition {
        ModelDefinition::new("Order", ModelSchema::new().field("total", FieldKind::Number))
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        futures::executor::block_on(future)
    }

    #[test]
    fn collection_name_defaults_to_lowercase() {
        assert_eq!(order().collection_name(), "order");
        assert_eq!(order().collection("orders").collection_name(), "orders");
    }

    #[test]
    fn register_is_idempotent() {
        block_on(async {
            let store = CollectionsOnly::default();
            let registry = ModelRegistry::new(handle_for(&store).await);

            let first = registry.register([order()]).await;
            let second = registry.register([order()]).await;

            assert!(first.is_complete());
            assert!(second.is_complete());
            assert_eq!(first.get("Order").unwrap().collection(), second.get("Order").unwrap().collection());
            assert_eq!(store.creates(), 1);
        });
    }

    #[test]
    fn lost_creation_race_reuses_existing_collection() {
        block_on(async {
            let store = CollectionsOnly::default();
            let winner = handle_for(&store).await;
            ModelRegistry::new(winner).register_one(order()).await.unwrap();

            let stale = CollectionsOnly { stale_listing: true, ..store.clone() };
            let model = ModelRegistry::new(handle_for(&stale).await)
                .register_one(order())
                .await
                .unwrap();

            assert_eq!(model.collection_name(), "order");
            assert_eq!(store.creates(), 1);
        });
    }

    #[test]
    fn failures_are_scoped_to_their_definition() {
        block_on(async {
            let store = CollectionsOnly { failing: Some("broken"), ..Default::default() };
            let registry = ModelRegistry::new(handle_for(&store).await);

            let outcome = registry
                .register([order(), ModelDefinition::new("Broken", ModelSchema::new())])
                .await;

            assert!(outcome.get("Order").is_some());
            let err = outcome.error("Broken").unwrap();
            assert!(err.is_model_registration());
            assert_eq!(
                err.to_string(),
                "Failed to register model Broken: Backend error: cannot create broken"
            );
            assert!(!outcome.is_complete());
        });
    }

    #[test]
    fn listing_failure_fails_every_definition() {
        block_on(async {
            let store = CollectionsOnly { failing: Some("*"), ..Default::default() };
            let outcome = ModelRegistry::new(handle_for(&store).await)
                .register([order(), ModelDefinition::new("Customer", ModelSchema::new())])
                .await;

            assert_eq!(outcome.failures().count(), 2);
            assert_eq!(store.creates(), 0);
        });
    }

    #[test]
    fn missing_handle_is_a_configuration_error() {
        block_on(async {
            let outcome = ModelRegistry::new(None::<ConnectionHandle>)
                .register([order(), ModelDefinition::new("Customer", ModelSchema::new())])
                .await;

            assert_eq!(outcome.len(), 2);
            assert!(outcome.failures().all(|(_, err)| err.is_configuration()));
            assert!(outcome.into_result().is_err());
        });
    }

    #[test]
    fn duplicate_definitions_bind_once() {
        block_on(async {
            let store = CollectionsOnly::default();
            let outcome = ModelRegistry::new(handle_for(&store).await)
                .register([order(), order()])
                .await;

            assert_eq!(outcome.len(), 1);
            assert!(outcome.is_complete());
            assert_eq!(store.creates(), 1);
        });
    }

    #[test]
    fn conflicting_definitions_fail_the_name() {
        block_on(async {
            let store = CollectionsOnly::default();
            let outcome = ModelRegistry::new(handle_for(&store).await)
                .register([order(), order().collection("orders")])
                .await;

            assert!(outcome.error("Order").unwrap().is_model_registration());
            assert_eq!(store.creates(), 0);
        });
    }
}
