//! Integration tests for binding models to collections.

mod common;

use arangolayer::{backend::StoreBackend, memory::InMemoryStore, prelude::*};
use common::{connect, order_model, order_schema};
use futures::future::join;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn order_model_binds_lowercase_collection() {
    let store = InMemoryStore::new();
    let registry = ModelRegistry::new(connect(&store).await);

    let model = registry.register_one(order_model()).await.unwrap();

    assert_eq!(model.name(), "Order");
    assert_eq!(model.collection_name(), "order");
    assert_eq!(store.list_collections().await.unwrap().len(), 1);
}

#[tokio::test]
async fn registering_twice_reuses_collections() {
    let store = InMemoryStore::new();
    let registry = ModelRegistry::new(connect(&store).await);
    let definitions = || {
        [
            order_model(),
            ModelDefinition::new("Customer", ModelSchema::new()).collection("customers"),
        ]
    };

    let first = registry.register(definitions()).await.into_result().unwrap();
    let second = registry.register(definitions()).await.into_result().unwrap();

    assert_eq!(first["Order"].collection(), second["Order"].collection());
    assert_eq!(first["Customer"].collection(), second["Customer"].collection());
    assert_eq!(
        store
            .list_collections()
            .await
            .unwrap()
            .into_iter()
            .map(|collection| collection.name)
            .collect::<Vec<_>>(),
        ["customers", "order"]
    );
}

#[tokio::test]
async fn existing_collection_is_bound_not_created() {
    let store = InMemoryStore::builder().collection("order").build();
    let existing = store.get_collection("order").await.unwrap().unwrap();

    let model = ModelRegistry::new(connect(&store).await)
        .register_one(order_model())
        .await
        .unwrap();

    assert_eq!(model.collection(), &existing);
}

#[tokio::test]
async fn concurrent_registries_converge_on_one_collection() {
    let store = InMemoryStore::new();
    let left = ModelRegistry::new(connect(&store).await);
    let right = ModelRegistry::new(connect(&store).await);

    let (a, b) = join(left.register_one(order_model()), right.register_one(order_model())).await;

    assert_eq!(a.unwrap().collection(), b.unwrap().collection());
    assert_eq!(store.list_collections().await.unwrap().len(), 1);
}

#[tokio::test]
async fn registry_without_handle_fails_every_definition() {
    let registrations = ModelRegistry::new(None::<ConnectionHandle>)
        .register([order_model(), ModelDefinition::new("Customer", ModelSchema::new())])
        .await;

    assert_eq!(registrations.len(), 2);
    assert!(registrations.failures().all(|(_, err)| err.is_configuration()));
}

#[tokio::test]
async fn store_failure_is_scoped_to_registration() {
    let store = InMemoryStore::new();
    let registry = ModelRegistry::new(connect(&store).await);
    store.set_reachable(false);

    let err = registry.register_one(order_model()).await.unwrap_err();

    assert!(err.is_model_registration());
    assert!(err.to_string().starts_with("Failed to register model Order: "));
}

#[tokio::test]
async fn conflicting_definitions_fail_only_their_name() {
    let store = InMemoryStore::new();
    let registrations = ModelRegistry::new(connect(&store).await)
        .register([
            order_model(),
            ModelDefinition::new("Order", order_schema()).collection("orders"),
            ModelDefinition::new("Customer", ModelSchema::new()),
        ])
        .await;

    assert!(!registrations.is_complete());
    assert!(registrations.error("Order").unwrap().is_model_registration());
    assert_eq!(registrations.get("Customer").unwrap().collection_name(), "customer");
}
