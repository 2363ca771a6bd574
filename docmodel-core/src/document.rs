//! Document containers and serialization helpers.
//!
//! `create` accepts and returns either a single document or a list of them; the
//! [`Documents`] enum keeps track of which one the caller handed in so the result
//! comes back in the same shape.

use bson::{Document, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DocumentStoreResult;

/// One document or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Documents {
    One(Document),
    Many(Vec<Document>),
}

impl Documents {
    /// Returns `true` if this holds a batch, even an empty one.
    pub fn is_many(&self) -> bool {
        matches!(self, Documents::Many(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Documents::One(_) => 1,
            Documents::Many(documents) => documents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single document, if this is not a batch.
    pub fn one(self) -> Option<Document> {
        match self {
            Documents::One(document) => Some(document),
            Documents::Many(_) => None,
        }
    }

    /// The batch, if this is not a single document.
    pub fn many(self) -> Option<Vec<Document>> {
        match self {
            Documents::One(_) => None,
            Documents::Many(documents) => Some(documents),
        }
    }

    /// Flattens into a list regardless of shape.
    pub fn into_vec(self) -> Vec<Document> {
        match self {
            Documents::One(document) => vec![document],
            Documents::Many(documents) => documents,
        }
    }

    /// Rebuilds a value of the same shape as `self` from `documents`.
    pub(crate) fn reshape(&self, mut documents: Vec<Document>) -> Documents {
        match self {
            Documents::Many(_) => Documents::Many(documents),
            Documents::One(_) => Documents::One(documents.pop().unwrap_or_default()),
        }
    }
}

impl From<Document> for Documents {
    fn from(document: Document) -> Self {
        Documents::One(document)
    }
}

impl From<Vec<Document>> for Documents {
    fn from(documents: Vec<Document>) -> Self {
        Documents::Many(documents)
    }
}

impl IntoIterator for Documents {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

/// Serializes a typed value into a document.
///
/// # Example
///
/// ```ignore
/// let student = to_document(&Student { first_name: "class".into() })?;
/// model.create(student).await?;
/// ```
pub fn to_document<T: Serialize>(value: &T) -> DocumentStoreResult<Document> {
    Ok(serialize_to_document(value)?)
}

/// Deserializes a document into a typed value.
pub fn from_document<T: DeserializeOwned>(document: Document) -> DocumentStoreResult<T> {
    Ok(deserialize_from_document(document)?)
}
