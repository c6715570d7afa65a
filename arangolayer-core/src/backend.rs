//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the wire interface the rest of the crate is written against:
//! collection management plus per-document CRUD filtered by field equality. A
//! [`Connector`] builds a backend for one endpoint; the
//! [`ConnectionManager`](crate::connection::ConnectionManager) probes it before
//! handing it out.
//!
//! # Examples
//!
//! ```ignore
//! use arangolayer::backend::StoreBackend;
//! use bson::doc;
//!
//! let stored = backend.insert_document("order", doc! { "total": 42 }).await?;
//! let key = stored.get_str("_key")?;
//! let found = backend.get_document("order", key).await?;
//! ```

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{connection::ConnectionConfig, error::DocumentStoreResult, query::Filter};

/// Version information returned by the reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    /// Server product name, e.g. `arango`.
    pub server: String,
    pub version: String,
}

/// A physical collection as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Store-assigned collection id.
    pub id: String,
    pub name: String,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single backend instance is shared by every
/// registry and repository that uses the same connection handle.
///
/// # Identity
///
/// Backends assign `_key`, `_id` and `_rev` on insert and renew `_rev` on every update.
/// Documents returned by any method include those fields.
///
/// # Error Handling
///
/// Missing documents are reported as `None`/`false`, not as errors. Network failures
/// should map to [`DocumentStoreError::Transport`](crate::error::DocumentStoreError::Transport),
/// server-side failures to [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Queries the server version. Used as the reachability probe.
    async fn version(&self) -> DocumentStoreResult<ServerVersion>;

    /// Lists the non-system collections of the database.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<CollectionInfo>>;

    /// Creates an empty collection.
    ///
    /// # Errors
    ///
    /// Must return [`DocumentStoreError::CollectionAlreadyExists`](crate::error::DocumentStoreError::CollectionAlreadyExists)
    /// if a collection with that name exists.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<CollectionInfo>;

    /// Looks up a collection by exact name.
    async fn get_collection(&self, name: &str) -> DocumentStoreResult<Option<CollectionInfo>>;

    /// Stores a new document and returns it with its assigned identity fields.
    ///
    /// Identity fields present in `document` are ignored.
    async fn insert_document(
        &self,
        collection: &str,
        document: bson::Document,
    ) -> DocumentStoreResult<bson::Document>;

    /// Retrieves a document by key.
    async fn get_document(
        &self,
        collection: &str,
        key: &str,
    ) -> DocumentStoreResult<Option<bson::Document>>;

    /// Merges `patch` into the top level of an existing document and returns the result.
    ///
    /// Returns `Ok(None)` if no document has that key.
    async fn update_document(
        &self,
        collection: &str,
        key: &str,
        patch: bson::Document,
    ) -> DocumentStoreResult<Option<bson::Document>>;

    /// Deletes a document by key, returning whether a document was removed.
    async fn delete_document(&self, collection: &str, key: &str) -> DocumentStoreResult<bool>;

    /// Returns documents matching `filter` in store order, at most `limit` of them.
    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> DocumentStoreResult<Vec<bson::Document>>;

    /// Counts documents matching `filter`.
    async fn count_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64>;
}

/// Factory trait for creating backend instances against one endpoint.
///
/// The connector only builds the backend; it should not probe it. Reachability is
/// verified by the connection manager with [`StoreBackend::version`].
#[async_trait]
pub trait Connector: Send + Sync {
    type Backend: StoreBackend + 'static;

    /// Builds a backend for `endpoint` using the database, credentials and extra options
    /// of `config`.
    async fn connect(
        &self,
        endpoint: &str,
        config: &ConnectionConfig,
    ) -> DocumentStoreResult<Self::Backend>;
}
