//! In-memory document storage backend for arangolayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend`
//! trait that mimics the identity rules of an ArangoDB server. It is meant for
//! development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Store-assigned identity** - Numeric `_key`s, `<collection>/<key>` ids and fresh `_rev`s
//! - **Equality filters** - Numbers compare equal across integer and float representations
//! - **Simulated outages** - A reachability switch that fails every call with a transport error
//!
//! # Quick Start
//!
//! ```ignore
//! use arangolayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = InMemoryStore::new();
//!     let handle = ConnectionManager::new(store.clone())
//!         .establish(&ConnectionConfig::new("memory://local"))
//!         .await?;
//!
//!     println!("connected to {}", handle.server_version().server);
//!
//!     Ok(())
//! }
//! ```

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
