#![allow(dead_code)]

use arangolayer::{memory::InMemoryStore, prelude::*};
use serde::{Deserialize, Serialize};

pub const ENDPOINT: &str = "memory://local";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub customer_id: String,
    pub total: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Document for Order {
    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }
}

pub fn order_schema() -> ModelSchema {
    ModelSchema::new()
        .field("customerId", FieldKind::String)
        .field("total", FieldKind::Number)
        .field_with_default("status", FieldKind::String, FieldDefault::Value("open".into()))
}

pub fn order_model() -> ModelDefinition {
    ModelDefinition::new("Order", order_schema())
}

pub async fn connect(store: &InMemoryStore) -> ConnectionHandle {
    ConnectionManager::new(store.clone())
        .establish(&ConnectionConfig::new(ENDPOINT))
        .await
        .expect("in-memory store should be reachable")
}

/// A connected store with the `Order` model registered.
pub async fn orders() -> (InMemoryStore, Repository<Order>) {
    let store = InMemoryStore::new();
    let model = ModelRegistry::new(connect(&store).await)
        .register_one(order_model())
        .await
        .expect("registration should succeed");

    (store, model.repository())
}
