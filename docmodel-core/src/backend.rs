//! Storage backend abstraction.
//!
//! A [`Model`](crate::model::Model) never talks to a database driver directly. It
//! goes through the [`StoreBackend`] trait, which exposes the handful of primitives
//! the facade needs: acknowledged inserts, cursor reads, atomic find-and-update,
//! selector updates and deletes, counting, and index management.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: Object-safe counterpart used behind a shared [`Database`](crate::store::Database) handle
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use bson::doc;
//!
//! let stored = backend
//!     .insert_documents(vec![doc! { "firstName": "class" }], "students")
//!     .await?;
//! assert!(stored[0].contains_key("_id"));
//! ```

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    index::IndexSpec,
    query::{FindAndModifyOptions, FindOptions, UpdateOptions, UpdateResult},
};

/// Abstract interface for document storage backends.
///
/// Selectors and update documents are passed through in the store's native query
/// language. Identifiers are expected in native form; the facade takes care of
/// converting them before anything reaches a backend.
///
/// # Error Handling
///
/// A write that would duplicate a unique key must fail with
/// [`DocumentStoreError::DuplicateKey`](crate::error::DocumentStoreError::DuplicateKey).
/// Every other store failure is reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts documents into a collection, waiting for the write to be acknowledged.
    ///
    /// Documents without an `_id` get one assigned by the store.
    ///
    /// # Returns
    ///
    /// The documents as stored, each carrying its `_id`, in input order.
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Returns every document matching `selector`, shaped by `options`.
    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Atomically applies `update` to the first document matching `selector`.
    ///
    /// # Returns
    ///
    /// The document as it is after the update, or `None` when nothing matched and
    /// no upsert was requested.
    async fn find_one_and_update(
        &self,
        selector: Document,
        update: Document,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Applies `update` to the first (or, with `multi`, every) document matching `selector`.
    async fn update_documents(
        &self,
        selector: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;

    /// Deletes every document matching `selector` and returns how many were removed.
    async fn delete_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64>;

    /// Counts the documents matching `selector`.
    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64>;

    /// Creates an index unless an equivalent one already exists.
    async fn ensure_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<()>;

    /// Lists the names of a collection's indexes, the implicit `_id_` index included.
    ///
    /// Empty when the collection does not exist.
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>>;

    /// Releases the backend's resources.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`StoreBackend`].
///
/// Every `StoreBackend` implements this trait automatically, so backends only ever
/// implement `StoreBackend` themselves.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn find_one_and_update(
        &self,
        selector: Document,
        update: Document,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn update_documents(
        &self,
        selector: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult>;
    async fn delete_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64>;
    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64>;
    async fn ensure_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<()>;
    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::find_documents(self, selector, options, collection).await
    }

    async fn find_one_and_update(
        &self,
        selector: Document,
        update: Document,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::find_one_and_update(self, selector, update, options, collection).await
    }

    async fn update_documents(
        &self,
        selector: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        StoreBackend::update_documents(self, selector, update, options, collection).await
    }

    async fn delete_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_documents(self, selector, collection).await
    }

    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, selector, collection).await
    }

    async fn ensure_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        StoreBackend::ensure_index(self, index, collection).await
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_indexes(self, collection).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }
}

/// Factory trait for creating backend instances.
///
/// Builders carry connection settings and do the (possibly asynchronous) work of
/// opening a connection in [`build`](StoreBackendBuilder::build).
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
