use arangolayer_core::connection::{ConnectionConfig, ConnectionManager};
use arangolayer_http::ArangoHttpConnector;

#[tokio::test]
async fn establish_fails_fast_against_closed_port() {
    let config = ConnectionConfig::new("http://127.0.0.1:1").option("timeout_secs", 5);

    let err = ConnectionManager::new(ArangoHttpConnector::new())
        .establish(&config)
        .await
        .unwrap_err();

    assert!(err.is_connection(), "unexpected error: {err}");
    assert!(err.to_string().starts_with("Unable to connect: "));
}

#[tokio::test]
async fn invalid_client_options_fail_establish() {
    let config = ConnectionConfig::new("http://127.0.0.1:1").option("timeout_secs", -1);

    let err = ConnectionManager::new(ArangoHttpConnector::new())
        .establish(&config)
        .await
        .unwrap_err();

    assert!(err.is_connection());
    assert!(err.to_string().contains("timeout_secs"));
}
