//! MongoDB backend implementation for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait on
//! top of the official async driver. Selectors and update documents are handed to
//! the server unchanged.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Durable writes** - Writes are acknowledged by one node and journaled unless configured otherwise
//! - **Atomic updates** - Find-and-modify always returns the updated document
//! - **Duplicate key detection** - Unique index violations surface as `DuplicateKey` errors
//! - **Indexing** - Index creation and listing
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, mongodb::MongoDbStore, store::Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "school")
//!         .journal(true)
//!         .build()
//!         .await?;
//!     let database = Database::new(store);
//!
//!     Ok(())
//! }
//! ```

mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
