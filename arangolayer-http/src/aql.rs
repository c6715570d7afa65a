//! Translation of equality filters into AQL.
//!
//! Field names and values never end up in the query text; both are passed as bind
//! parameters (`doc.@f0 == @v0`).

use bson::Bson;
use serde_json::{Map, Value};

use arangolayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Filter, FilterVisitor},
};

/// A query string plus its bind parameters, ready for `POST /_api/cursor`.
#[derive(Debug, Clone, PartialEq)]
pub struct AqlQuery {
    pub query: String,
    pub bind_vars: Map<String, Value>,
}

impl AqlQuery {
    /// `FOR doc IN <collection> FILTER ... [LIMIT n] RETURN doc`
    pub fn find(collection: &str, filter: &Filter, limit: Option<usize>) -> DocumentStoreResult<Self> {
        let mut translator = AqlTranslator::new(collection);
        let condition = translator.visit_filter(filter)?;

        let mut query = format!("FOR doc IN @@collection FILTER {condition}");
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }
        query.push_str(" RETURN doc");

        Ok(Self { query, bind_vars: translator.bind_vars })
    }

    /// `RETURN COUNT(FOR doc IN <collection> FILTER ... RETURN 1)`
    pub fn count(collection: &str, filter: &Filter) -> DocumentStoreResult<Self> {
        let mut translator = AqlTranslator::new(collection);
        let condition = translator.visit_filter(filter)?;

        Ok(Self {
            query: format!("RETURN COUNT(FOR doc IN @@collection FILTER {condition} RETURN 1)"),
            bind_vars: translator.bind_vars,
        })
    }
}

pub(crate) struct AqlTranslator {
    bind_vars: Map<String, Value>,
}

impl AqlTranslator {
    fn new(collection: &str) -> Self {
        let mut bind_vars = Map::new();
        bind_vars.insert("@collection".into(), Value::String(collection.to_string()));

        Self { bind_vars }
    }
}

impl FilterVisitor for AqlTranslator {
    type Output = String;
    type Error = DocumentStoreError;

    fn visit_empty(&mut self) -> Result<String, DocumentStoreError> {
        Ok("true".into())
    }

    fn visit_eq(&mut self, index: usize, field: &str, value: &Bson) -> Result<String, DocumentStoreError> {
        self.bind_vars.insert(format!("f{index}"), Value::String(field.to_string()));
        self.bind_vars.insert(format!("v{index}"), serde_json::to_value(value)?);

        Ok(format!("doc.@f{index} == @v{index}"))
    }

    fn combine(&mut self, parts: Vec<String>) -> Result<String, DocumentStoreError> {
        Ok(parts.join(" AND "))
    }
}
