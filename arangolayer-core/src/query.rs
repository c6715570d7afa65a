//! Field-equality filters.
//!
//! A [`Filter`] matches documents whose fields equal every listed value. The empty
//! filter matches every document of a collection. Backends decide how to evaluate
//! a filter; [`FilterVisitor`] walks its conditions in declaration order.
//!
//! ```ignore
//! use arangolayer::query::Filter;
//!
//! let open_orders = Filter::eq("status", "open").and_eq("customerId", "c1");
//! ```

use bson::Bson;

use crate::{document::Fields, error::DocumentStoreError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: bson::Document,
}

impl Filter {
    /// The empty filter, matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter with a single equality condition.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::all().and_eq(field, value)
    }

    /// Adds an equality condition. A later condition on the same field replaces the earlier one.
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Iterates over `(field, expected value)` pairs.
    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.conditions.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Fields> for Filter {
    fn from(fields: Fields) -> Self {
        Self { conditions: fields.into_document() }
    }
}

impl From<bson::Document> for Filter {
    fn from(conditions: bson::Document) -> Self {
        Self { conditions }
    }
}

/// Visitor over the conditions of a [`Filter`].
///
/// Backends implement this to translate or evaluate filters. `visit_filter` combines
/// the per-condition results with [`FilterVisitor::combine`].
pub trait FilterVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    /// Result for the empty filter.
    fn visit_empty(&mut self) -> Result<Self::Output, Self::Error>;

    fn visit_eq(&mut self, index: usize, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;

    /// Conjunction of the results of all conditions.
    fn combine(&mut self, parts: Vec<Self::Output>) -> Result<Self::Output, Self::Error>;

    fn visit_filter(&mut self, filter: &Filter) -> Result<Self::Output, Self::Error> {
        if filter.is_empty() {
            return self.visit_empty();
        }

        let parts = filter
            .conditions()
            .enumerate()
            .map(|(index, (field, value))| self.visit_eq(index, field, value))
            .collect::<Result<Vec<_>, _>>()?;

        self.combine(parts)
    }
}
