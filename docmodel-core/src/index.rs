//! Index declarations.
//!
//! An index is declared either as a plain key document (`{"firstName": 1}`) or with
//! options attached:
//!
//! ```ignore
//! use docmodel::index::IndexSpec;
//!
//! model.indices([
//!     IndexSpec::from(doc! { "firstName": 1 }),
//!     IndexSpec::new(doc! { "lastName": -1 }).unique(true).sparse(true),
//! ]).await?;
//! ```

use bson::{Bson, Document};

/// A single index declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    /// Indexed fields and their directions.
    pub keys: Document,
    /// Reject documents that would duplicate an indexed value.
    pub unique: bool,
    /// Skip documents that lack the indexed fields.
    pub sparse: bool,
    /// Explicit index name; derived from the keys when absent.
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn new(keys: Document) -> Self {
        Self {
            keys,
            unique: false,
            sparse: false,
            name: None,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The index name, following the store's `field_direction` convention
    /// (`{"firstName": 1, "age": -1}` becomes `firstName_1_age_-1`).
    pub fn index_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }

        self.keys
            .iter()
            .map(|(field, direction)| format!("{field}_{}", render_direction(direction)))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The indexed field names, in key order.
    pub fn fields(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }
}

fn render_direction(direction: &Bson) -> String {
    match direction {
        Bson::Int32(value) => value.to_string(),
        Bson::Int64(value) => value.to_string(),
        Bson::Double(value) => (*value as i64).to_string(),
        Bson::String(value) => value.clone(),
        other => other.to_string(),
    }
}

impl From<Document> for IndexSpec {
    fn from(keys: Document) -> Self {
        IndexSpec::new(keys)
    }
}

/// Name of the index every collection carries on `_id`.
pub const ID_INDEX_NAME: &str = "_id_";
