//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native selectors** - Comparison, membership, existence and logical operators
//! - **Update operators** - `$set`, `$unset`, `$inc`, replacement and upserts
//! - **Unique indexes** - Enforced on every write
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{memory::InMemoryStore, store::Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = Database::new(InMemoryStore::builder().build().await?);
//!     let students = database.model("students").build()?;
//!
//!     students.create(doc! { "firstName": "class" }).await?;
//!
//!     Ok(())
//! }
//! ```

mod evaluator;
pub mod store;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
