//! Core traits and types for document representation and serialization.
//!
//! Every stored document carries three identity fields assigned by the store
//! (`_key`, `_id`, `_rev`) and two timestamps owned by the repository layer
//! (`createdAt`, `updatedAt`). Typed documents embed them through [`DocumentMeta`].

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Store-assigned document key, unique within a collection.
pub const KEY_FIELD: &str = "_key";
/// Store-assigned global id, `<collection>/<key>`.
pub const ID_FIELD: &str = "_id";
/// Store-assigned revision stamp, renewed on every write.
pub const REV_FIELD: &str = "_rev";
/// Creation timestamp, written once by the repository.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Last modification timestamp, rewritten by the repository on every update.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Fields that only the store may assign.
pub const IDENTITY_FIELDS: [&str; 3] = [KEY_FIELD, ID_FIELD, REV_FIELD];

/// The reserved fields of a stored document.
///
/// Embed it in a document struct with `#[serde(flatten)]`:
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Order {
///     #[serde(flatten)]
///     pub meta: DocumentMeta,
///     #[serde(rename = "customerId")]
///     pub customer_id: String,
///     pub total: i64,
/// }
///
/// impl Document for Order {
///     fn meta(&self) -> &DocumentMeta { &self.meta }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "createdAt", default, with = "timestamp_format", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, with = "timestamp_format", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Core trait that all documents handled by a [`Repository`](crate::repository::Repository)
/// must implement.
///
/// The only requirement beyond serde is access to the reserved fields. Documents built by
/// application code before they are stored simply leave [`DocumentMeta`] at its default.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the reserved fields of this document.
    fn meta(&self) -> &DocumentMeta;

    /// Store-assigned key, `None` until the document has been stored.
    fn key(&self) -> Option<&str> {
        self.meta().key.as_deref()
    }

    /// Store-assigned global id (`<collection>/<key>`).
    fn id(&self) -> Option<&str> {
        self.meta().id.as_deref()
    }

    /// Store-assigned revision stamp.
    fn rev(&self) -> Option<&str> {
        self.meta().rev.as_deref()
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.meta().created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.meta().updated_at
    }
}

/// Extension trait providing conversions between documents and their BSON form.
///
/// Automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document into a [`Fields`] payload, dropping unset (`null`) fields.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the document is not a map.
    fn to_fields(&self) -> DocumentStoreResult<Fields>;

    /// Creates a document from a stored BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_stored(document: bson::Document) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_fields(&self) -> DocumentStoreResult<Fields> {
        Fields::from_serialize(self)
    }

    fn from_stored(document: bson::Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}

/// A partial document: a map of field name to value.
///
/// `Fields` is the payload type of `create` and `update`, and the raw material of
/// [`Filter`](crate::query::Filter). Build it from a `bson::Document`, from any
/// serializable value, or field by field:
///
/// ```ignore
/// let fields = Fields::new().set("customerId", "c1").set("total", 42);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(bson::Document);

impl Fields {
    pub fn new() -> Self {
        Self(bson::Document::new())
    }

    /// Serializes `value` into fields, skipping fields that serialize to `null`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if `value` does not serialize to a map.
    pub fn from_serialize<S: Serialize + ?Sized>(value: &S) -> DocumentStoreResult<Self> {
        match serialize_to_bson(value)? {
            Bson::Document(document) => Ok(Self(
                document
                    .into_iter()
                    .filter(|(_, v)| !matches!(v, Bson::Null))
                    .collect(),
            )),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a map of fields, got {:?}",
                other.element_type()
            ))),
        }
    }

    /// Sets a field, replacing any previous value.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Bson> {
        self.0.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Removes `_key`, `_id` and `_rev`.
    pub fn strip_identity(&mut self) {
        for field in IDENTITY_FIELDS {
            self.0.remove(field);
        }
    }

    pub fn as_document(&self) -> &bson::Document {
        &self.0
    }

    pub fn into_document(self) -> bson::Document {
        self.0
    }
}

impl From<bson::Document> for Fields {
    fn from(document: bson::Document) -> Self {
        Self(document)
    }
}

impl From<Fields> for bson::Document {
    fn from(fields: Fields) -> Self {
        fields.0
    }
}

/// Encodes a timestamp the way the repository stores it: RFC 3339, UTC, nanosecond precision.
///
/// The fixed width keeps stored timestamps ordered lexicographically.
pub fn timestamp_to_bson(at: DateTime<Utc>) -> Bson {
    Bson::String(at.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Serde format of [`DocumentMeta`] timestamps, matching [`timestamp_to_bson`].
mod timestamp_format {
    use super::*;

    pub fn serialize<S: Serializer>(at: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match at {
            Some(at) => serializer.serialize_some(&at.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<DateTime<Utc>>::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        #[serde(flatten)]
        meta: DocumentMeta,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    }

    impl Document for Note {
        fn meta(&self) -> &DocumentMeta {
            &self.meta
        }
    }

    #[test]
    fn strip_identity_keeps_application_fields() {
        let mut fields = Fields::from(doc! {
            "_key": "1",
            "_id": "note/1",
            "_rev": "_abc",
            "text": "hello",
        });

        fields.strip_identity();

        assert_eq!(fields.as_document(), &doc! { "text": "hello" });
    }

    #[test]
    fn from_serialize_drops_nulls() {
        let fields = Fields::from_serialize(&doc! { "text": "hi", "tag": Bson::Null }).unwrap();

        assert_eq!(fields.len(), 1);
        assert!(!fields.contains("tag"));
    }

    #[test]
    fn from_serialize_rejects_scalars() {
        let err = Fields::from_serialize(&42).unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[test]
    fn unstored_document_has_no_identity() {
        let note = Note { meta: DocumentMeta::default(), text: "draft".into(), tag: None };
        let fields = note.to_fields().unwrap();

        assert_eq!(fields.as_document(), &doc! { "text": "draft" });
        assert_eq!(note.key(), None);
    }

    #[test]
    fn stored_document_exposes_meta() {
        let now = Utc::now();
        let note = Note::from_stored(doc! {
            "_key": "7",
            "_id": "note/7",
            "_rev": "_r1",
            "createdAt": timestamp_to_bson(now),
            "updatedAt": timestamp_to_bson(now),
            "text": "stored",
        })
        .unwrap();

        assert_eq!(note.key(), Some("7"));
        assert_eq!(note.id(), Some("note/7"));
        assert_eq!(note.rev(), Some("_r1"));
        assert_eq!(note.created_at(), Some(now));
        assert_eq!(note.created_at(), note.updated_at());
    }

    #[test]
    fn meta_timestamps_serialize_like_stored_ones() {
        use chrono::TimeZone;

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let note = Note {
            meta: DocumentMeta { created_at: Some(at), updated_at: Some(at), ..Default::default() },
            text: "dated".into(),
            tag: None,
        };

        let fields = note.to_fields().unwrap();

        assert_eq!(fields.get(CREATED_AT_FIELD), Some(&timestamp_to_bson(at)));
        assert_eq!(fields.get(UPDATED_AT_FIELD), Some(&Bson::String("2024-05-01T12:00:00.000000000Z".into())));
        assert_eq!(Note::from_stored(fields.into_document()).unwrap().created_at(), Some(at));
    }
}
