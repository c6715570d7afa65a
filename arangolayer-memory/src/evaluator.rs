//! Filter evaluation for in-memory documents.
//!
//! Equality follows the store's JSON model: integers and floats with the same value
//! are equal, everything else compares structurally.

use std::collections::HashMap;
use bson::{Bson, datetime::DateTime};

use arangolayer_core::{
    error::DocumentStoreError,
    query::{Filter, FilterVisitor},
};

/// Comparable view of a BSON value with numbers normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Binary and other non-JSON values, compared by identity of the raw value.
    Opaque(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Opaque(other),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Opaque(a), Comparable::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

/// Evaluates a [`Filter`] against one stored document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a bson::Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a bson::Document) -> Self {
        Self { document }
    }

    pub fn matches(document: &'a bson::Document, filter: &Filter) -> bool {
        DocumentEvaluator::new(document)
            .visit_filter(filter)
            .unwrap_or(false)
    }
}

impl FilterVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_empty(&mut self) -> Result<bool, DocumentStoreError> {
        Ok(true)
    }

    fn visit_eq(&mut self, _index: usize, field: &str, value: &Bson) -> Result<bool, DocumentStoreError> {
        // a missing field only equals null
        let expected = Comparable::from(value);

        Ok(match self.document.get(field) {
            Some(actual) => Comparable::from(actual) == expected,
            None => expected == Comparable::Null,
        })
    }

    fn combine(&mut self, parts: Vec<bool>) -> Result<bool, DocumentStoreError> {
        Ok(parts.into_iter().all(|part| part))
    }
}
