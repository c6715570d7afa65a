//! Schema descriptions for models.
//!
//! A [`ModelSchema`] is plain data: field names with a kind and an optional default.
//! It is used to default and normalize documents, never to reject them.

use std::collections::BTreeMap;

use bson::Bson;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{CREATED_AT_FIELD, Fields, UPDATED_AT_FIELD, timestamp_to_bson};

/// The declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Any,
}

/// Value used for a field the caller did not supply on creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDefault {
    /// A fixed value.
    Value(Bson),
    /// The creation instant.
    Now,
}

/// A single field of a [`ModelSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldDefault>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        Self { kind, default: None }
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// Description of a model's fields.
///
/// # Example
///
/// ```ignore
/// let schema = ModelSchema::new()
///     .field("customerId", FieldKind::String)
///     .field_with_default("status", FieldKind::String, FieldDefault::Value("open".into()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl ModelSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a field without a default.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), FieldSpec::new(kind));
        self
    }

    /// Declares a field with a default applied on creation.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        default: FieldDefault,
    ) -> Self {
        self.fields
            .insert(name.into(), FieldSpec::new(kind).with_default(default));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Declares `createdAt` and `updatedAt` as `Date` fields defaulting to the creation
    /// instant, unless the schema already declares them.
    pub fn with_timestamps(mut self) -> Self {
        for name in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            self.fields.entry(name.to_string()).or_insert_with(|| {
                FieldSpec::new(FieldKind::Date).with_default(FieldDefault::Now)
            });
        }
        self
    }

    /// Fills every field missing from `fields` that has a default.
    ///
    /// All `Now` defaults of one call share the instant `now`.
    pub fn apply_defaults(&self, fields: &mut Fields, now: DateTime<Utc>) {
        for (name, spec) in &self.fields {
            if fields.contains(name) {
                continue;
            }

            match &spec.default {
                Some(FieldDefault::Value(value)) => fields.insert(name.clone(), value.clone()),
                Some(FieldDefault::Now) => fields.insert(name.clone(), timestamp_to_bson(now)),
                None => {}
            }
        }
    }
}
