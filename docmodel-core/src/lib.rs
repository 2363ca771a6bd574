//! A thin object-document mapping layer over a document database.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Model facade** ([`model`]) - Validated CRUD operations bound to one collection
//! - **Schemas** ([`schema`], [`json_schema`], [`field_map`]) - Field declarations and the two validator dialects
//! - **Identifiers** ([`oid`]) - Recognition and conversion between string and native identifiers
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Store handle** ([`store`]) - The shared [`Database`](store::Database) handle models talk through
//! - **Selectors and options** ([`query`]) - Per-operation options and selector helpers
//! - **Indexes** ([`index`]) - Index declarations
//! - **Documents** ([`document`]) - One-or-many document containers and serde helpers
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use serde_json::json;
//!
//! let students = Model::builder("students")
//!     .json_schema(json!({ "firstName": { "type": "string", "required": true } }))
//!     .database(database)
//!     .build()?;
//!
//! let found = students.find(doc! { "firstName": "class" }, None).await?;
//! ```

pub mod backend;
pub mod document;
pub mod error;
pub mod field_map;
pub mod index;
pub mod json_schema;
pub mod model;
pub mod oid;
pub mod query;
pub mod schema;
pub mod store;
