//! Error types and result types for connection, registration and repository operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`]. Missing
//! documents are never reported through this type: repositories return `None` or `false`.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document store.
///
/// The first four variants form the taxonomy callers usually match on. The remaining
/// variants are produced by store backends and surface wrapped inside
/// [`DocumentStoreError::Operation`] or [`DocumentStoreError::ModelRegistration`].
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// No usable connection handle was supplied to a registry or repository.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Establishing or verifying a connection failed.
    #[error("Unable to connect: {0}")]
    Connection(String),
    /// Listing or creating the collection of a model definition failed.
    #[error("Failed to register model {model}: {source}")]
    ModelRegistration {
        /// Logical model name of the failed definition.
        model: String,
        /// The underlying cause.
        #[source]
        source: Box<DocumentStoreError>,
    },
    /// A store call made by a repository operation failed.
    #[error("{operation} on collection {collection} failed: {source}")]
    Operation {
        /// Repository operation that was in flight (e.g. `create`, `count`).
        operation: &'static str,
        /// Physical collection name.
        collection: String,
        /// The error reported by the backend.
        #[source]
        source: Box<DocumentStoreError>,
    },
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The request never reached the store (refused connection, timeout, DNS failure, ...).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The store answered with an error.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A collection with the given name already exists.
    #[error("Collection already exists: {0}")]
    CollectionAlreadyExists(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Wraps `self` as the cause of a failed repository operation.
    pub fn in_operation(self, operation: &'static str, collection: impl Into<String>) -> Self {
        DocumentStoreError::Operation {
            operation,
            collection: collection.into(),
            source: Box::new(self),
        }
    }

    /// Wraps `self` as the cause of a failed model registration.
    pub fn in_registration(self, model: impl Into<String>) -> Self {
        DocumentStoreError::ModelRegistration {
            model: model.into(),
            source: Box::new(self),
        }
    }

    /// Returns `true` for [`DocumentStoreError::Configuration`].
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` for [`DocumentStoreError::Connection`].
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for [`DocumentStoreError::ModelRegistration`].
    pub fn is_model_registration(&self) -> bool {
        matches!(self, Self::ModelRegistration { .. })
    }

    /// Returns `true` for [`DocumentStoreError::Operation`].
    pub fn is_operation(&self) -> bool {
        matches!(self, Self::Operation { .. })
    }

    /// Returns `true` if the store reported that a collection already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::CollectionAlreadyExists(_))
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
