//! A thin object-document mapping layer over a document database.
//!
//! This crate is the primary entry point of the docmodel project. It re-exports the
//! core types and the available storage backends.
//!
//! A [`Model`](model::Model) binds a collection name to an optional schema and
//! exposes create/read/update/delete operations that
//!
//! - validate documents against the schema before any write reaches the store
//! - convert string identifiers to native `ObjectId`s on the way in
//! - render native identifiers back as strings on the way out
//! - optionally pass every read result through an output formatter
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let database = Database::new(InMemoryStore::builder().build().await?);
//!
//!     let students = database
//!         .model("students")
//!         .json_schema(json!({
//!             "firstName": { "type": "string", "required": true },
//!             "lastName": { "type": "string" },
//!             "teacherId": "objectid",
//!         }))
//!         .build()?;
//!
//!     let created = students
//!         .create(doc! { "firstName": "class", "lastName": "dojo" })
//!         .await?
//!         .one()
//!         .unwrap_or_default();
//!
//!     let id = created.get_str("_id").unwrap_or_default();
//!     let found = students.find_by_id(id).await?;
//!     println!("Found student: {found:?}");
//!
//!     students
//!         .update(doc! { "_id": id, "lastName": "dodo" }, None)
//!         .await?;
//!
//!     students.remove_by_id(id).await?;
//!     database.shutdown().await
//! }
//! ```
//!
//! # Schemas
//!
//! Two declaration dialects are supported:
//!
//! - [`JsonSchema`](json_schema::JsonSchema) rejects undeclared properties and reports every failure
//! - [`FieldMap`](field_map::FieldMap) strips undeclared properties and stops at the first failure
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

pub mod prelude;

pub use docmodel_core::{
    backend, document, error, field_map, index, json_schema, model, oid, query, schema, store,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
