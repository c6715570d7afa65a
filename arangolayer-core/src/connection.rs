//! Connection configuration and lifecycle.
//!
//! A [`ConnectionManager`] turns a [`ConnectionConfig`] into a verified
//! [`ConnectionHandle`]: it builds a backend for the first configured endpoint, probes
//! it with a version query and only then hands out the handle. The handle is immutable
//! and cheap to clone; every registry and repository holds a clone of it.
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::{connection::{ConnectionConfig, ConnectionManager}, memory::InMemoryStore};
//!
//! let manager = ConnectionManager::new(InMemoryStore::new());
//! let handle = manager
//!     .establish(&ConnectionConfig::new("memory://local").database("shop"))
//!     .await?;
//! ```

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::{
    backend::{Connector, ServerVersion, StoreBackend},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Database used when the configuration does not name one.
pub const DEFAULT_DATABASE: &str = "_system";

/// Username and password sent with every request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection parameters.
///
/// Deserializable from any serde source. `url` accepts a single address or a list;
/// only the first address is ever used.
///
/// ```ignore
/// let config: ConnectionConfig = serde_json::from_value(json!({
///     "url": ["http://db-1:8529", "http://db-2:8529"],
///     "database": "shop",
///     "auth": { "username": "root", "password": "secret" },
///     "extra": { "timeout_secs": 5 }
/// }))?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "url", alias = "endpoints", deserialize_with = "one_or_many")]
    endpoints: Vec<String>,
    #[serde(default = "default_database", alias = "databaseName")]
    database: String,
    #[serde(default, rename = "auth", alias = "credentials", skip_serializing_if = "Option::is_none")]
    credentials: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    extra: Map<String, Value>,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(endpoint) => vec![endpoint],
        OneOrMany::Many(endpoints) => endpoints,
    })
}

impl ConnectionConfig {
    /// Creates a configuration for a single endpoint and the default database.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_endpoints([endpoint])
    }

    /// Creates a configuration from an ordered list of endpoints.
    pub fn with_endpoints<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            database: default_database(),
            credentials: None,
            extra: Map::new(),
        }
    }

    /// Reads `ARANGO_URL` (comma separated), `ARANGO_DATABASE`, `ARANGO_USERNAME` and
    /// `ARANGO_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if `ARANGO_URL` is unset or empty.
    pub fn from_env() -> DocumentStoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocumentStoreResult<Self> {
        let endpoints = lookup("ARANGO_URL")
            .map(|urls| {
                urls.split(',')
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|urls| !urls.is_empty())
            .ok_or_else(|| DocumentStoreError::Configuration("ARANGO_URL is not set".into()))?;

        let mut config = Self::with_endpoints(endpoints);

        if let Some(database) = lookup("ARANGO_DATABASE") {
            config = config.database(database);
        }
        if let Some(username) = lookup("ARANGO_USERNAME") {
            let password = lookup("ARANGO_PASSWORD").unwrap_or_default();
            config = config.credentials(Credentials::new(username, password));
        }

        Ok(config)
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Adds a driver-specific option. Options are passed to the connector verbatim.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// The endpoint a connection is made against.
    pub fn primary_endpoint(&self) -> Option<&str> {
        self.endpoints.first().map(String::as_str)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn auth(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Produces a [`ConnectionConfig`] at startup.
///
/// Implemented for async closures, so dependencies can simply be captured:
///
/// ```ignore
/// let secrets = secrets.clone();
/// let handle = manager
///     .establish_async(&move || {
///         let secrets = secrets.clone();
///         async move {
///             Ok(ConnectionConfig::new(secrets.url().await?)
///                 .credentials(secrets.credentials().await?))
///         }
///     })
///     .await?;
/// ```
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self) -> DocumentStoreResult<ConnectionConfig>;
}

#[async_trait]
impl<F, Fut> ConfigResolver for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = DocumentStoreResult<ConnectionConfig>> + Send + 'static,
{
    async fn resolve(&self) -> DocumentStoreResult<ConnectionConfig> {
        (self)().await
    }
}

/// An additional connection layer (for example an ODM session) established against the
/// same target as the primary connection.
#[async_trait]
pub trait SecondaryLayer: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    async fn attach(&self, endpoint: &str, config: &ConnectionConfig) -> DocumentStoreResult<()>;
}

/// A verified connection to one logical database.
///
/// Cloning is cheap; all clones share the same backend.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    backend: Box<dyn StoreBackend>,
    endpoint: String,
    database: String,
    version: ServerVersion,
    secondary: Option<String>,
}

impl ConnectionHandle {
    pub fn backend(&self) -> &dyn StoreBackend {
        &*self.inner.backend
    }

    /// The endpoint the connection was made against.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// Version reported by the reachability probe.
    pub fn server_version(&self) -> &ServerVersion {
        &self.inner.version
    }

    /// Name of the attached secondary layer, if any.
    pub fn secondary_layer(&self) -> Option<&str> {
        self.inner.secondary.as_deref()
    }

    /// Returns `true` if both handles come from the same `establish` call.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Establishes verified connections through a [`Connector`].
pub struct ConnectionManager<C: Connector> {
    connector: C,
    secondary: Option<Box<dyn SecondaryLayer>>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C) -> Self {
        Self { connector, secondary: None }
    }

    /// Attaches `layer` after every successful primary probe. A failing layer fails the
    /// whole `establish` call.
    pub fn with_secondary(mut self, layer: impl SecondaryLayer + 'static) -> Self {
        self.secondary = Some(Box::new(layer));
        self
    }

    /// Connects to the first endpoint of `config` and verifies it.
    ///
    /// No retries and no fallback to further endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Connection`] if no endpoint is configured, the
    /// connector fails, the version probe fails, or the secondary layer fails.
    pub async fn establish(&self, config: &ConnectionConfig) -> DocumentStoreResult<ConnectionHandle> {
        let endpoint = config
            .primary_endpoint()
            .ok_or_else(|| DocumentStoreError::Connection("no endpoint configured".into()))?;
        let database = config.database_name();

        info!(endpoint, database, "Connecting to database");

        match self.connect_verified(endpoint, config).await {
            Ok(handle) => {
                info!(
                    endpoint,
                    database,
                    version = %handle.server_version().version,
                    "Successfully connected to database"
                );
                Ok(handle)
            }
            Err(err) => {
                let err = into_connection_error(err);
                error!(endpoint, database, error = %err, "Failed to establish database connection");
                Err(err)
            }
        }
    }

    /// Resolves the configuration with `resolver`, then behaves like [`establish`](Self::establish).
    ///
    /// # Errors
    ///
    /// Resolver failures are reported as [`DocumentStoreError::Connection`].
    pub async fn establish_async<R>(&self, resolver: &R) -> DocumentStoreResult<ConnectionHandle>
    where
        R: ConfigResolver + ?Sized,
    {
        let config = resolver.resolve().await.map_err(|err| {
            error!(error = %err, "Failed to resolve connection options");
            DocumentStoreError::Connection(format!("failed to resolve connection options: {err}"))
        })?;

        self.establish(&config).await
    }

    async fn connect_verified(
        &self,
        endpoint: &str,
        config: &ConnectionConfig,
    ) -> DocumentStoreResult<ConnectionHandle> {
        let backend = self.connector.connect(endpoint, config).await?;
        let version = backend.version().await?;

        if let Some(layer) = &self.secondary {
            layer.attach(endpoint, config).await.map_err(|err| {
                DocumentStoreError::Connection(format!("secondary layer {}: {err}", layer.name()))
            })?;
        }

        Ok(ConnectionHandle {
            inner: Arc::new(HandleInner {
                backend: Box::new(backend),
                endpoint: endpoint.to_string(),
                database: config.database_name().to_string(),
                version,
                secondary: self.secondary.as_ref().map(|layer| layer.name().to_string()),
            }),
        })
    }
}

/// Keeps the underlying message of transport and server errors, so the resulting
/// `Connection` error reads "Unable to connect: <driver message>".
fn into_connection_error(err: DocumentStoreError) -> DocumentStoreError {
    match err {
        DocumentStoreError::Connection(message)
        | DocumentStoreError::Transport(message)
        | DocumentStoreError::Backend(message) => DocumentStoreError::Connection(message),
        other => DocumentStoreError::Connection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn deserializes_single_url() {
        let config: ConnectionConfig = serde_json::from_value(json!({
            "url": "http://localhost:8529",
        }))
        .unwrap();

        assert_eq!(config.endpoints(), ["http://localhost:8529"]);
        assert_eq!(config.database_name(), DEFAULT_DATABASE);
        assert_eq!(config.auth(), None);
    }

    #[test]
    fn deserializes_url_list_and_options() {
        let config: ConnectionConfig = serde_json::from_value(json!({
            "url": ["http://db-1:8529", "http://db-2:8529"],
            "databaseName": "shop",
            "auth": { "username": "root", "password": "secret" },
            "extra": { "timeout_secs": 5 },
        }))
        .unwrap();

        assert_eq!(config.primary_endpoint(), Some("http://db-1:8529"));
        assert_eq!(config.endpoints().len(), 2);
        assert_eq!(config.database_name(), "shop");
        assert_eq!(config.auth(), Some(&Credentials::new("root", "secret")));
        assert_eq!(config.extra().get("timeout_secs"), Some(&json!(5)));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("root", "hunter2"));

        assert!(rendered.contains("root"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn from_lookup_reads_variables() {
        let vars = HashMap::from([
            ("ARANGO_URL", "http://a:8529, http://b:8529"),
            ("ARANGO_DATABASE", "shop"),
            ("ARANGO_USERNAME", "app"),
            ("ARANGO_PASSWORD", "pw"),
        ]);

        let config =
            ConnectionConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.endpoints(), ["http://a:8529", "http://b:8529"]);
        assert_eq!(config.database_name(), "shop");
        assert_eq!(config.auth(), Some(&Credentials::new("app", "pw")));
    }

    #[test]
    fn from_lookup_requires_url() {
        let err = ConnectionConfig::from_lookup(|_| None).unwrap_err();

        assert!(err.is_configuration());
    }

    #[test]
    fn transport_message_is_kept() {
        let err = into_connection_error(DocumentStoreError::Transport("connection refused".into()));

        assert_eq!(err.to_string(), "Unable to connect: connection refused");
    }
}
