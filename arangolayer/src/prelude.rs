//! Convenient re-exports of commonly used types from arangolayer.
//!
//! ```ignore
//! use arangolayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Connection configuration and establishment
//! - Model definitions, schemas and the registry
//! - Repositories, documents, fields and filters
//! - Backend traits and error types

pub use arangolayer_core::{
    backend::{CollectionInfo, Connector, ServerVersion, StoreBackend},
    connection::{ConfigResolver, ConnectionConfig, ConnectionHandle, ConnectionManager, Credentials, SecondaryLayer},
    document::{Document, DocumentExt, DocumentMeta, Fields},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filter, FilterVisitor},
    registry::{BoundModel, ModelDefinition, ModelRegistry, Registrations},
    repository::Repository,
    schema::{FieldDefault, FieldKind, FieldSpec, ModelSchema},
};
