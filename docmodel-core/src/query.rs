//! Selectors and per-operation options.
//!
//! Selectors are plain BSON documents in the store's native query language, where
//! operator keys start with [`OPERATOR_SIGIL`] (`{"age": {"$gt": 18}}`). This module
//! adds the options each store operation accepts and a few helpers for inspecting
//! and building selectors.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::query::{FindOptions, SortDirection};
//!
//! let options = FindOptions::builder()
//!     .projection(doc! { "firstName": 1 })
//!     .sort("lastName", SortDirection::Asc)
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};

use crate::schema::ID_FIELD;

/// Prefix of every query and update operator key.
pub const OPERATOR_SIGIL: char = '$';

/// Returns `true` if any key of `selector`, at any depth, is an operator.
pub fn has_operator(selector: &Document) -> bool {
    selector
        .iter()
        .any(|(key, value)| key.starts_with(OPERATOR_SIGIL) || value_has_operator(value))
}

fn value_has_operator(value: &Bson) -> bool {
    match value {
        Bson::Document(document) => has_operator(document),
        Bson::Array(values) => values.iter().any(value_has_operator),
        _ => false,
    }
}

/// Builds `{_id: {$in: [...]}}` for a set of native identifiers.
pub fn ids_selector(ids: impl IntoIterator<Item = ObjectId>) -> Document {
    doc! {
        ID_FIELD: {
            "$in": ids.into_iter().map(Bson::ObjectId).collect::<Vec<_>>(),
        },
    }
}

/// Builds `{_id: id}` for a single native identifier.
pub fn id_selector(id: ObjectId) -> Document {
    doc! { ID_FIELD: id }
}

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    /// The store's numeric rendering of this direction.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// Renders sort keys as the store's sort document (`{field: 1 | -1}`).
pub fn sort_document(sort: &[Sort]) -> Document {
    sort.iter()
        .map(|key| (key.field.clone(), Bson::Int32(key.direction.as_i32())))
        .collect()
}

/// Options for cursor-based reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Fields to include (`{field: 1}`) or exclude (`{field: 0}`).
    pub projection: Option<Document>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new builder for fluent construction.
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::new()
    }
}

/// Builder for [`FindOptions`].
#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the returned fields.
    pub fn projection(mut self, projection: Document) -> Self {
        self.options.projection = Some(projection);
        self
    }

    /// Appends a sort key.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort::new(field, direction));
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: i64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Options for selector-based updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Update every matching document instead of the first one.
    pub multi: bool,
    /// Insert a document when nothing matches.
    pub upsert: bool,
}

impl UpdateOptions {
    /// Options for a multi-document update.
    pub fn multi() -> Self {
        Self { multi: true, upsert: false }
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// Options for atomic find-and-modify operations.
///
/// The store always returns the document as it is after the update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindAndModifyOptions {
    /// Insert a document when nothing matches.
    pub upsert: bool,
    /// Which document to modify when several match. Defaults to ascending `_id`.
    pub sort: Vec<Sort>,
}

impl FindAndModifyOptions {
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(Sort::new(field, direction));
        self
    }

    /// The sort keys to hand to the store, falling back to ascending `_id`.
    pub fn effective_sort(&self) -> Vec<Sort> {
        match self.sort.is_empty() {
            true => vec![Sort::new(ID_FIELD, SortDirection::Asc)],
            false => self.sort.clone(),
        }
    }
}

/// What the store reports after a selector-based update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Number of documents the selector matched.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
    /// The identifier of an upserted document, if one was inserted.
    pub upserted_id: Option<Bson>,
}
