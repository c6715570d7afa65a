//! ArangoDB HTTP backend implementation for arangolayer.
//!
//! This crate provides an implementation of the `StoreBackend` trait that talks to an
//! ArangoDB server over its REST API.
//!
//! To use this backend, include the `http` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! arangolayer = { version = "x.y.z", features = ["http"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Documents live in a real ArangoDB database
//! - **AQL filters** - Equality filters run server-side with bind parameters
//! - **Cursor draining** - Large result sets are fetched batch by batch
//! - **Client options** - Request timeout and default headers through `extra`
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::{prelude::*, http::ArangoHttpConnector};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let config = ConnectionConfig::new("http://localhost:8529")
//!         .database("shop")
//!         .credentials(Credentials::new("root", "secret"))
//!         .option("timeout_secs", 5);
//!
//!     let handle = ConnectionManager::new(ArangoHttpConnector::new())
//!         .establish(&config)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod aql;
pub mod error;
pub mod store;

pub use store::{ArangoHttpConnector, ArangoHttpStore};
