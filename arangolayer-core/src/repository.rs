//! Typed CRUD repositories.
//!
//! A [`Repository`] serves one collection for one document type. It owns the document
//! lifecycle rules: identity fields are assigned by the store and never taken from the
//! caller, `createdAt`/`updatedAt` are written by the repository, and updates are partial
//! merges.
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::prelude::*;
//!
//! let orders: Repository<Order> = bound_order_model.repository();
//!
//! let order = orders
//!     .create(Fields::new().set("customerId", "c1").set("total", 42))
//!     .await?;
//! let id = order.id().unwrap();
//!
//! let updated = orders.update(id, Fields::new().set("total", 99)).await?;
//! assert!(orders.exists(Filter::eq("total", 99)).await?);
//! ```

use std::{fmt, marker::PhantomData};

use chrono::Utc;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    connection::ConnectionHandle,
    document::{CREATED_AT_FIELD, Document, DocumentExt, Fields, UPDATED_AT_FIELD, timestamp_to_bson},
    error::{DocumentStoreError, DocumentStoreResult},
    query::Filter,
    registry::BoundModel,
    schema::ModelSchema,
};

/// CRUD access to one collection, typed as `T`.
///
/// Repositories hold no per-call state and can be shared across tasks.
pub struct Repository<T: Document> {
    collection: String,
    schema: ModelSchema,
    handle: ConnectionHandle,
    _marker: PhantomData<T>,
}

impl<T: Document> Repository<T> {
    /// Creates a repository from a collection name, a schema and a connection handle.
    ///
    /// The schema gets `createdAt`/`updatedAt` fields defaulting to the creation time
    /// unless it already declares them.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if `handle` is `None`.
    pub fn new(
        collection: impl Into<String>,
        schema: ModelSchema,
        handle: Option<&ConnectionHandle>,
    ) -> DocumentStoreResult<Self> {
        let handle = handle.ok_or_else(|| {
            DocumentStoreError::Configuration("No database connection found".into())
        })?;

        Ok(Self::build(collection.into(), schema, handle.clone()))
    }

    /// Creates a repository over a bound model's collection.
    pub fn from_model(model: &BoundModel) -> Self {
        Self::build(
            model.collection_name().to_string(),
            model.schema().clone(),
            model.handle().clone(),
        )
    }

    fn build(collection: String, schema: ModelSchema, handle: ConnectionHandle) -> Self {
        Self {
            collection,
            schema: schema.with_timestamps(),
            handle,
            _marker: PhantomData,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// The normalized schema, including the timestamp fields.
    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    fn backend(&self) -> &dyn StoreBackend {
        self.handle.backend()
    }

    fn context(&self, operation: &'static str) -> impl FnOnce(DocumentStoreError) -> DocumentStoreError + '_ {
        move |err| err.in_operation(operation, self.collection.as_str())
    }

    /// Resolves a global id (`<collection>/<key>`) or a bare key to a key of this collection.
    fn key_of<'a>(&self, id: &'a str) -> Option<&'a str> {
        let key = match id.split_once('/') {
            Some((collection, key)) if collection == self.collection => key,
            Some(_) => return None,
            None => id,
        };

        (!key.is_empty()).then_some(key)
    }

    /// Stores a new document built from `fields`.
    ///
    /// Client-supplied `_key`, `_id`, `_rev`, `createdAt` and `updatedAt` are discarded.
    /// Schema defaults fill the missing fields. Both timestamps are always written with
    /// the same instant, whatever the schema declares for them.
    pub async fn create(&self, fields: impl Into<Fields>) -> DocumentStoreResult<T> {
        let mut fields = fields.into();
        fields.strip_identity();
        fields.remove(CREATED_AT_FIELD);
        fields.remove(UPDATED_AT_FIELD);

        let now = Utc::now();
        self.schema.apply_defaults(&mut fields, now);
        fields.insert(CREATED_AT_FIELD, timestamp_to_bson(now));
        fields.insert(UPDATED_AT_FIELD, timestamp_to_bson(now));

        let stored = self
            .backend()
            .insert_document(&self.collection, fields.into_document())
            .await
            .map_err(self.context("create"))?;

        debug!(collection = %self.collection, key = ?stored.get_str("_key").ok(), "Created document");

        T::from_stored(stored).map_err(self.context("create"))
    }

    /// Stores a copy of `document`, ignoring its reserved fields.
    pub async fn insert(&self, document: &T) -> DocumentStoreResult<T> {
        let fields = document.to_fields().map_err(self.context("create"))?;

        self.create(fields).await
    }

    /// Looks a document up by global id or key. Ids of other collections are not found.
    pub async fn find_by_id(&self, id: &str) -> DocumentStoreResult<Option<T>> {
        let Some(key) = self.key_of(id) else {
            return Ok(None);
        };

        self.backend()
            .get_document(&self.collection, key)
            .await
            .map_err(self.context("find_by_id"))?
            .map(T::from_stored)
            .transpose()
            .map_err(self.context("find_by_id"))
    }

    /// Returns the first document matching every field of `filter`.
    pub async fn find_one(&self, filter: impl Into<Filter>) -> DocumentStoreResult<Option<T>> {
        self.backend()
            .find_documents(&self.collection, &filter.into(), Some(1))
            .await
            .map_err(self.context("find_one"))?
            .into_iter()
            .next()
            .map(T::from_stored)
            .transpose()
            .map_err(self.context("find_one"))
    }

    /// Returns every document matching `filter`; [`Filter::all`] matches all of them.
    pub async fn find_many(&self, filter: impl Into<Filter>) -> DocumentStoreResult<Vec<T>> {
        self.backend()
            .find_documents(&self.collection, &filter.into(), None)
            .await
            .map_err(self.context("find_many"))?
            .into_iter()
            .map(T::from_stored)
            .collect::<DocumentStoreResult<Vec<T>>>()
            .map_err(self.context("find_many"))
    }

    pub async fn find_all(&self) -> DocumentStoreResult<Vec<T>> {
        self.find_many(Filter::all()).await
    }

    /// Merges `fields` into the document with the given id and returns the result.
    ///
    /// Identity fields and `createdAt` in `fields` are ignored; `updatedAt` is always set
    /// to the current time. Returns `Ok(None)` if the id does not exist.
    pub async fn update(&self, id: &str, fields: impl Into<Fields>) -> DocumentStoreResult<Option<T>> {
        let Some(key) = self.key_of(id) else {
            return Ok(None);
        };

        let mut patch = fields.into();
        patch.strip_identity();
        patch.remove(CREATED_AT_FIELD);
        patch.insert(UPDATED_AT_FIELD, timestamp_to_bson(Utc::now()));

        let updated = self
            .backend()
            .update_document(&self.collection, key, patch.into_document())
            .await
            .map_err(self.context("update"))?;

        if updated.is_none() {
            debug!(collection = %self.collection, key, "Update target not found");
        }

        updated
            .map(T::from_stored)
            .transpose()
            .map_err(self.context("update"))
    }

    /// Deletes the document with the given id. Returns `false` if it did not exist.
    pub async fn delete(&self, id: &str) -> DocumentStoreResult<bool> {
        let Some(key) = self.key_of(id) else {
            return Ok(false);
        };

        self.backend()
            .delete_document(&self.collection, key)
            .await
            .map_err(self.context("delete"))
    }

    pub async fn count(&self, filter: impl Into<Filter>) -> DocumentStoreResult<u64> {
        self.backend()
            .count_documents(&self.collection, &filter.into())
            .await
            .map_err(self.context("count"))
    }

    /// `true` iff [`count`](Self::count) of `filter` is positive.
    pub async fn exists(&self, filter: impl Into<Filter>) -> DocumentStoreResult<bool> {
        Ok(self.count(filter).await? > 0)
    }
}

impl<T: Document> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            schema: self.schema.clone(),
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Document> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.collection)
            .field("document", &std::any::type_name::<T>())
            .field("database", &self.handle.database())
            .finish()
    }
}
