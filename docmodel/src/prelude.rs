//! Convenient re-exports of commonly used types from docmodel.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```

pub use bson::{Bson, Document, doc, oid::ObjectId};

pub use docmodel_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    document::{Documents, from_document, to_document},
    error::{DocumentStoreError, DocumentStoreResult},
    field_map::FieldMap,
    index::IndexSpec,
    json_schema::JsonSchema,
    model::{Model, ModelBuilder, OutputFormatter},
    oid::is_object_id,
    query::{FindAndModifyOptions, FindOptions, Sort, SortDirection, UpdateOptions, UpdateResult},
    schema::{Dialect, FieldDescriptor, FieldKind, SchemaValidator, ValidationError, ValidationErrors},
    store::Database,
};
