use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, ser::serialize_to_bson};
use reqwest::{
    Client, Method, RequestBuilder, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use arangolayer_core::{
    backend::{CollectionInfo, Connector, ServerVersion, StoreBackend},
    connection::{ConnectionConfig, Credentials},
    document::IDENTITY_FIELDS,
    error::{DocumentStoreError, DocumentStoreResult},
    query::Filter,
};

use crate::{
    aql::AqlQuery,
    error::{ApiFailure, transport},
};

/// Rows requested per cursor batch.
const BATCH_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
struct VersionReply {
    server: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct CollectionReply {
    id: String,
    name: String,
}

impl From<CollectionReply> for CollectionInfo {
    fn from(reply: CollectionReply) -> Self {
        Self { id: reply.id, name: reply.name }
    }
}

#[derive(Debug, Deserialize)]
struct CollectionListReply {
    result: Vec<CollectionReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CursorReply {
    #[serde(default)]
    result: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WriteReply {
    new: Value,
}

/// Converts a JSON object from the wire into a document.
fn to_document(value: Value) -> DocumentStoreResult<bson::Document> {
    match serialize_to_bson(&value)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a JSON object, got {:?}",
            other.element_type()
        ))),
    }
}

/// Converts a document into a JSON object for the wire, dropping identity fields.
fn to_payload(document: bson::Document) -> DocumentStoreResult<Value> {
    let stripped = document
        .into_iter()
        .filter(|(field, _)| !IDENTITY_FIELDS.contains(&field.as_str()))
        .collect::<bson::Document>();

    Ok(serde_json::to_value(&stripped)?)
}

/// Whether `key` is a legal ArangoDB document key. Illegal keys cannot name a stored
/// document.
fn is_legal_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 254
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-:.@()+,=;$!*'%".contains(c))
}

/// Document store speaking the ArangoDB HTTP API for one database.
#[derive(Debug, Clone)]
pub struct ArangoHttpStore {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ArangoHttpStore {
    /// Creates a store for `database` on the server at `endpoint`.
    ///
    /// `tcp://` and `ssl://` endpoints are rewritten to `http://` and `https://`.
    pub fn new(client: Client, endpoint: &str, database: &str, credentials: Option<Credentials>) -> Self {
        let endpoint = endpoint.trim_end_matches('/');
        let endpoint = if let Some(rest) = endpoint.strip_prefix("tcp://") {
            format!("http://{rest}")
        } else if let Some(rest) = endpoint.strip_prefix("ssl://") {
            format!("https://{rest}")
        } else {
            endpoint.to_string()
        };

        Self {
            client,
            base_url: format!("{endpoint}/_db/{database}"),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The URL of `segments` below the database, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> DocumentStoreResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            DocumentStoreError::Configuration(format!("invalid endpoint {}: {err}", self.base_url))
        })?;

        url.path_segments_mut()
            .map_err(|()| DocumentStoreError::Configuration(format!("invalid endpoint {}", self.base_url)))?
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> DocumentStoreResult<RequestBuilder> {
        let request = self.client.request(method, self.url(segments)?);

        Ok(match &self.credentials {
            Some(credentials) => request.basic_auth(&credentials.username, Some(&credentials.password)),
            None => request,
        })
    }

    /// Sends `request`. Transport failures are errors; server-side failures are returned
    /// as the inner `Err` so callers can decide what a 404 means.
    async fn send(&self, request: RequestBuilder) -> DocumentStoreResult<Result<Value, ApiFailure>> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Ok(Err(ApiFailure::parse(status.as_u16(), &body)));
        }

        if body.trim().is_empty() {
            return Ok(Ok(Value::Null));
        }

        Ok(Ok(serde_json::from_str(&body)?))
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        subject: &str,
    ) -> DocumentStoreResult<T> {
        let value = self
            .send(request)
            .await?
            .map_err(|failure| failure.into_error(subject))?;

        Ok(serde_json::from_value(value)?)
    }

    /// Like [`call`](Self::call), but a missing document is `None`.
    async fn call_document<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        collection: &str,
    ) -> DocumentStoreResult<Option<T>> {
        match self.send(request).await? {
            Ok(value) => Ok(Some(serde_json::from_value(value)?)),
            Err(failure) if failure.is_document_not_found() => Ok(None),
            Err(failure) => Err(failure.into_error(collection)),
        }
    }

    /// Runs an AQL query and drains its cursor.
    async fn query(&self, aql: AqlQuery, collection: &str) -> DocumentStoreResult<Vec<Value>> {
        debug!(collection, query = %aql.query, "Running AQL query");

        let mut reply: CursorReply = self
            .call(
                self.request(Method::POST, &["_api", "cursor"])?.json(&json!({
                    "query": aql.query,
                    "bindVars": aql.bind_vars,
                    "batchSize": BATCH_SIZE,
                })),
                collection,
            )
            .await?;

        let mut rows = std::mem::take(&mut reply.result);
        while reply.has_more {
            let Some(id) = reply.id.take() else {
                return Err(DocumentStoreError::Backend("cursor reports more results but has no id".into()));
            };

            reply = self
                .call(self.request(Method::PUT, &["_api", "cursor", id.as_str()])?, collection)
                .await?;
            rows.append(&mut reply.result);
        }

        Ok(rows)
    }
}

#[async_trait]
impl StoreBackend for ArangoHttpStore {
    async fn version(&self) -> DocumentStoreResult<ServerVersion> {
        let reply: VersionReply = self
            .call(self.request(Method::GET, &["_api", "version"])?, "_api/version")
            .await?;

        Ok(ServerVersion { server: reply.server, version: reply.version })
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<CollectionInfo>> {
        let reply: CollectionListReply = self
            .call(
                self.request(Method::GET, &["_api", "collection"])?.query(&[("excludeSystem", "true")]),
                "_api/collection",
            )
            .await?;

        Ok(reply.result.into_iter().map(CollectionInfo::from).collect())
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<CollectionInfo> {
        let reply: CollectionReply = self
            .call(
                self.request(Method::POST, &["_api", "collection"])?.json(&json!({ "name": name })),
                name,
            )
            .await?;

        Ok(reply.into())
    }

    async fn get_collection(&self, name: &str) -> DocumentStoreResult<Option<CollectionInfo>> {
        match self
            .call::<CollectionReply>(self.request(Method::GET, &["_api", "collection", name])?, name)
            .await
        {
            Ok(reply) => Ok(Some(reply.into())),
            Err(DocumentStoreError::CollectionNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: bson::Document,
    ) -> DocumentStoreResult<bson::Document> {
        let reply: WriteReply = self
            .call(
                self.request(Method::POST, &["_api", "document", collection])?
                    .query(&[("returnNew", "true")])
                    .json(&to_payload(document)?),
                collection,
            )
            .await?;

        to_document(reply.new)
    }

    async fn get_document(
        &self,
        collection: &str,
        key: &str,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        if !is_legal_key(key) {
            return Ok(None);
        }

        self.call_document::<Value>(
            self.request(Method::GET, &["_api", "document", collection, key])?,
            collection,
        )
        .await?
        .map(to_document)
        .transpose()
    }

    async fn update_document(
        &self,
        collection: &str,
        key: &str,
        patch: bson::Document,
    ) -> DocumentStoreResult<Option<bson::Document>> {
        if !is_legal_key(key) {
            return Ok(None);
        }

        self.call_document::<WriteReply>(
            self.request(Method::PATCH, &["_api", "document", collection, key])?
                .query(&[("returnNew", "true"), ("mergeObjects", "false")])
                .json(&to_payload(patch)?),
            collection,
        )
        .await?
        .map(|reply| to_document(reply.new))
        .transpose()
    }

    async fn delete_document(&self, collection: &str, key: &str) -> DocumentStoreResult<bool> {
        if !is_legal_key(key) {
            return Ok(false);
        }

        Ok(self
            .call_document::<Value>(
                self.request(Method::DELETE, &["_api", "document", collection, key])?,
                collection,
            )
            .await?
            .is_some())
    }

    async fn find_documents(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> DocumentStoreResult<Vec<bson::Document>> {
        self.query(AqlQuery::find(collection, filter, limit)?, collection)
            .await?
            .into_iter()
            .map(to_document)
            .collect()
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> DocumentStoreResult<u64> {
        let rows = self.query(AqlQuery::count(collection, filter)?, collection).await?;

        rows.first()
            .and_then(Value::as_u64)
            .ok_or_else(|| DocumentStoreError::Backend("COUNT query returned no number".into()))
    }
}

/// Builds [`ArangoHttpStore`]s from a [`ConnectionConfig`].
///
/// Recognized `extra` options:
///
/// - `timeout_secs` (number): request timeout
/// - `headers` (object of strings): headers sent with every request
#[derive(Debug, Clone, Default)]
pub struct ArangoHttpConnector;

impl ArangoHttpConnector {
    pub fn new() -> Self {
        Self
    }

    fn client(config: &ConnectionConfig) -> DocumentStoreResult<Client> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.extra().get("timeout_secs") {
            let secs = timeout
                .as_f64()
                .filter(|secs| *secs > 0.0 && *secs < f64::from(u32::MAX))
                .ok_or_else(|| {
                    DocumentStoreError::Configuration(format!(
                        "timeout_secs must be a positive number, got {timeout}"
                    ))
                })?;
            builder = builder.timeout(Duration::from_secs_f64(secs));
        }

        if let Some(headers) = config.extra().get("headers") {
            builder = builder.default_headers(Self::headers(headers)?);
        }

        builder
            .build()
            .map_err(|err| DocumentStoreError::Configuration(format!("invalid HTTP client options: {err}")))
    }

    fn headers(value: &Value) -> DocumentStoreResult<HeaderMap> {
        let invalid = |detail: String| DocumentStoreError::Configuration(format!("invalid headers option: {detail}"));

        let Value::Object(entries) = value else {
            return Err(invalid("expected an object".into()));
        };

        let mut headers = HeaderMap::new();
        for (name, value) in entries {
            let Some(value) = value.as_str() else {
                return Err(invalid(format!("value of {name} is not a string")));
            };

            headers.insert(
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| invalid(format!("{name}: {err}")))?,
                HeaderValue::from_str(value).map_err(|err| invalid(format!("{name}: {err}")))?,
            );
        }

        Ok(headers)
    }
}

#[async_trait]
impl Connector for ArangoHttpConnector {
    type Backend = ArangoHttpStore;

    async fn connect(&self, endpoint: &str, config: &ConnectionConfig) -> DocumentStoreResult<Self::Backend> {
        let client = Self::client(config)?;
        let store = ArangoHttpStore::new(client, endpoint, config.database_name(), config.auth().cloned());

        debug!(base_url = %store.base_url(), "Created ArangoDB HTTP client");

        Ok(store)
    }
}
