//! Error types and result types for model operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`]. Store
//! failures that the model does not understand are passed through as
//! [`DocumentStoreError::Backend`] without being retried or rewritten.

use bson::{Document, error::Error as BsonError};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::schema::ValidationErrors;

/// Represents all possible errors that can occur when working with a model or its store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A model was constructed without a collection name.
    #[error("collection name cannot be empty")]
    MissingCollectionName,
    /// A value could not be converted to a native identifier.
    /// The first argument is the rejected value, the second is the collection name.
    #[error("Invalid object id: {0} (collection {1})")]
    InvalidId(String, String),
    /// An identifier-typed field carried a value that is not a valid identifier.
    #[error("Must provide a valid object id for `{0}`")]
    InvalidIdField(String),
    /// An update was requested without an `_id`.
    #[error("No _id parameter supplied with object to update in collection {0}")]
    MissingId(String),
    /// The schema rejected a document.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    /// A lookup by id or unique query found nothing.
    #[error("Not found in collection {collection}: {query}")]
    NotFound {
        /// The query as it was sent to the store.
        query: Document,
        /// The collection that was searched.
        collection: String,
    },
    /// An update targeted an `_id` that is not stored.
    #[error("{collection} with `_id` {id} does not exist")]
    DocumentMissing {
        /// The identifier, in string form.
        id: String,
        /// The collection that was searched.
        collection: String,
    },
    /// No store handle has been configured for the model.
    #[error("No database configured for collection {0}")]
    NoDatabase(String),
    /// A schema declaration could not be understood.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// The store rejected a write because it would duplicate a unique key.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document or operator document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns the structured validation failures, if this is a validation error.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            DocumentStoreError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Returns `true` for errors caused by a duplicate unique key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DocumentStoreError::DuplicateKey(_))
    }

    /// Returns `true` when a lookup or update found no matching document.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::NotFound { .. } | DocumentStoreError::DocumentMissing { .. }
        )
    }
}

/// A specialized `Result` type for model and store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<ValidationErrors> for DocumentStoreError {
    fn from(errors: ValidationErrors) -> Self {
        DocumentStoreError::Validation(errors)
    }
}
