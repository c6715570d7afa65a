//! A thin client-side layer over ArangoDB-style document databases.
//!
//! This crate is the core of the arangolayer project and provides:
//!
//! - **Connections** ([`connection`]) - Configuration, fail-fast connection establishment and shared handles
//! - **Model registration** ([`registry`]) - Idempotent binding of model definitions to collections
//! - **Repositories** ([`repository`]) - Typed CRUD with store-assigned identity and timestamps
//! - **Documents and schemas** ([`document`], [`schema`]) - Document traits, field sets and defaults
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Filters** ([`query`]) - Field-equality filters
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
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
//!     fn meta(&self) -> &DocumentMeta {
//!         &self.meta
//!     }
//! }
//!
//! let handle = ConnectionManager::new(InMemoryStore::new())
//!     .establish(&ConnectionConfig::new("memory://local"))
//!     .await?;
//!
//! let schema = ModelSchema::new()
//!     .field("customerId", FieldKind::String)
//!     .field("total", FieldKind::Number);
//!
//! let order = ModelRegistry::new(handle)
//!     .register_one(ModelDefinition::new("Order", schema))
//!     .await?;
//!
//! let orders = order.repository::<Order>();
//! ```

pub mod backend;
pub mod connection;
pub mod document;
pub mod error;
pub mod query;
pub mod registry;
pub mod repository;
pub mod schema;
