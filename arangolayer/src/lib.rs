//! Main arangolayer crate providing connections, model registration and typed
//! repositories over ArangoDB-style document databases.
//!
//! This crate is the primary entry point. It re-exports the core types and provides
//! access to the storage backends.
//!
//! # Features
//!
//! - **Fail-fast connections** - A connection handle exists only after the server answered a version probe
//! - **Idempotent registration** - Models bind to collections that are created on first use
//! - **Typed repositories** - CRUD over serde types with store-assigned identity and timestamps
//! - **Multiple backends** - In-memory storage and an ArangoDB HTTP driver behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use arangolayer::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! pub struct Order {
//!     #[serde(flatten)]
//!     pub meta: DocumentMeta,
//!     pub customer_id: String,
//!     pub total: i64,
//! }
//!
//! impl Document for Order {
//!     fn meta(&self) -> &DocumentMeta { &self.meta }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     // Connect and verify
//!     let handle = ConnectionManager::new(InMemoryStore::new())
//!         .establish(&ConnectionConfig::new("memory://local"))
//!         .await?;
//!
//!     // Bind the model to its collection, creating it if needed
//!     let schema = ModelSchema::new()
//!         .field("customerId", FieldKind::String)
//!         .field("total", FieldKind::Number);
//!     let model = ModelRegistry::new(handle)
//!         .register_one(ModelDefinition::new("Order", schema))
//!         .await?;
//!
//!     // CRUD
//!     let orders = model.repository::<Order>();
//!     let order = orders
//!         .create(Fields::new().set("customerId", "c1").set("total", 42))
//!         .await?;
//!
//!     let id = order.id().unwrap_or_default();
//!     orders.update(id, Fields::new().set("total", 99)).await?;
//!
//!     println!("{} orders", orders.count(Filter::all()).await?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Registering many models
//!
//! Definitions registered together are bound concurrently and fail independently:
//!
//! ```ignore
//! let registrations = ModelRegistry::new(handle)
//!     .register([
//!         ModelDefinition::new("Order", order_schema),
//!         ModelDefinition::new("Customer", customer_schema).collection("customers"),
//!     ])
//!     .await;
//!
//! for (model, err) in registrations.failures() {
//!     eprintln!("{model}: {err}");
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - `http` - ArangoDB REST API driver (requires the `http` feature)

pub mod prelude;

pub use arangolayer_core::{backend, connection, document, error, query, registry, repository, schema};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use arangolayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// ArangoDB HTTP backend implementations.
///
/// This module is only available when the `http` feature is enabled.
#[cfg(feature = "http")]
pub mod http {
    pub use arangolayer_http::{ArangoHttpConnector, ArangoHttpStore, aql::AqlQuery};
}
