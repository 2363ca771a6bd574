//! The shared store handle.
//!
//! A [`Database`] wraps one backend behind an `Arc` so any number of models can
//! share it. Cloning the handle is cheap; the backend is released when
//! [`Database::shutdown`] is called on the last handle.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{memory::InMemoryStoreBuilder, store::Database};
//!
//! let database = Database::new(InMemoryStoreBuilder::new().build().await?);
//! let students = database.model("students").build()?;
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    error::DocumentStoreResult,
    model::ModelBuilder,
};

#[derive(Debug, Clone)]
pub struct Database {
    backend: Arc<Box<dyn DynStoreBackend>>,
}

impl Database {
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn DynStoreBackend>) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// The backend every model sharing this handle talks to.
    pub fn backend(&self) -> &dyn DynStoreBackend {
        &**self.backend
    }

    /// Starts building a model bound to this handle.
    pub fn model(&self, name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name).database(self.clone())
    }

    /// Returns `true` if both handles share the same backend.
    pub fn same_backend(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }

    /// Shuts the backend down if this is the last handle to it.
    ///
    /// While other handles are alive this only drops the current one.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        match Arc::into_inner(self.backend) {
            Some(backend) => backend.shutdown_boxed().await,
            None => {
                debug!("backend still shared, skipping shutdown");
                Ok(())
            }
        }
    }
}
