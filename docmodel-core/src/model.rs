//! The model facade.
//!
//! A [`Model`] binds one collection to an optional schema, an optional output
//! formatter and a shared [`Database`] handle. Every operation runs the same
//! pipeline around the store call: identifiers are converted from their string
//! form to native form on the way in, documents are validated against the schema
//! before anything is written, and identifiers are rendered back to strings on the
//! way out.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::prelude::*;
//! use serde_json::json;
//!
//! let students = database
//!     .model("students")
//!     .json_schema(json!({
//!         "firstName": { "type": "string", "required": true },
//!         "lastName": "string",
//!     }))
//!     .build()?;
//!
//! let created = students
//!     .create(doc! { "firstName": "class", "lastName": "dojo" })
//!     .await?
//!     .one()
//!     .unwrap_or_default();
//!
//! let found = students.find_by_id(created.get_str("_id")?).await?;
//! ```

use std::{fmt, sync::Arc};

use bson::{Bson, Document, doc, oid::ObjectId};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    backend::DynStoreBackend,
    document::Documents,
    error::{DocumentStoreError, DocumentStoreResult},
    index::IndexSpec,
    json_schema::JsonSchema,
    oid,
    query::{
        FindAndModifyOptions, FindOptions, UpdateOptions, UpdateResult, has_operator, id_selector,
        ids_selector,
    },
    schema::{Dialect, ID_FIELD, Schema, SchemaValidator, ValidationErrors},
    store::Database,
};

/// A caller-supplied transformation applied to read results.
pub type OutputFormatter = Arc<dyn Fn(Document) -> Document + Send + Sync>;

/// Data access for one collection.
#[derive(Clone)]
pub struct Model {
    name: String,
    validator: Option<Arc<dyn SchemaValidator>>,
    formatter: Option<OutputFormatter>,
    database: Option<Database>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("validator", &self.validator)
            .field("formatter", &self.formatter.is_some())
            .field("database", &self.database)
            .finish()
    }
}

impl Model {
    /// Creates a model without schema, formatter or database.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MissingCollectionName`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> DocumentStoreResult<Self> {
        ModelBuilder::new(name).build()
    }

    /// Creates a new builder for fluent construction.
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    /// The collection this model reads and writes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The active schema validator, if any.
    pub fn schema(&self) -> Option<&dyn SchemaValidator> {
        self.validator.as_deref()
    }

    pub fn set_schema(&mut self, validator: impl SchemaValidator + 'static) {
        self.validator = Some(Arc::new(validator));
    }

    /// Parses a JSON-Schema-like declaration and makes it the active schema.
    ///
    /// The schema is named after the collection.
    pub fn set_json_schema(&mut self, declaration: &Value) -> DocumentStoreResult<()> {
        self.set_schema(JsonSchema::from_value(Some(&self.name), declaration)?);
        Ok(())
    }

    /// Names of the declared fields; empty without a schema.
    pub fn fields(&self) -> Vec<&str> {
        self.validator
            .as_deref()
            .map(|validator| validator.schema().field_names())
            .unwrap_or_default()
    }

    /// Names of the fields declared as identifiers; empty without a schema.
    pub fn object_id_fields(&self) -> Vec<&str> {
        self.validator
            .as_deref()
            .map(|validator| validator.schema().object_id_fields())
            .unwrap_or_default()
    }

    /// The store handle, if one has been attached.
    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn set_database(&mut self, database: Database) {
        self.database = Some(database);
    }

    pub fn output_formatter(&self) -> Option<&OutputFormatter> {
        self.formatter.as_ref()
    }

    pub fn set_output_formatter<F>(&mut self, formatter: F)
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
    }

    /// Converts `value` into a native identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidId`] tagged with this model's collection.
    pub fn object_id(&self, value: impl Into<Bson>) -> DocumentStoreResult<ObjectId> {
        oid::object_id(&value.into(), &self.name)
    }

    /// Returns `true` if `value` is, or can be converted into, a native identifier.
    pub fn is_object_id(value: &Bson) -> bool {
        oid::is_object_id(value)
    }

    /// Validates and inserts one document or a batch.
    ///
    /// The result has the same shape as the input, with `_id`s assigned by the
    /// store rendered as strings and the output formatter applied.
    ///
    /// # Errors
    ///
    /// Nothing is inserted if any document fails validation or identifier conversion.
    pub async fn create(&self, documents: impl Into<Documents>) -> DocumentStoreResult<Documents> {
        let documents = documents.into();
        let backend = self.backend()?;

        let prepared = match self.validator.as_deref() {
            Some(validator) if validator.dialect() == Dialect::JsonSchema => {
                self.prepare_checked(validator, &documents)?
            }
            validator => self.prepare_sequential(validator, &documents)?,
        };

        if prepared.is_empty() {
            return Ok(documents.reshape(Vec::new()));
        }

        debug!(collection = %self.name, count = prepared.len(), "creating documents");

        let stored = backend
            .insert_documents(prepared, &self.name)
            .await?
            .into_iter()
            .map(|document| self.present(document))
            .collect();

        Ok(documents.reshape(stored))
    }

    /// Validates every document before converting any of them.
    fn prepare_checked(
        &self,
        validator: &dyn SchemaValidator,
        documents: &Documents,
    ) -> DocumentStoreResult<Vec<Document>> {
        let documents = documents.clone().into_vec();

        for document in &documents {
            validator
                .validate(document)
                .map_err(|errors| self.rejected(errors))?;
        }

        documents
            .into_iter()
            .map(|document| validator.strings_to_ids(document))
            .collect()
    }

    /// Trims, converts, then validates each document in turn.
    fn prepare_sequential(
        &self,
        validator: Option<&dyn SchemaValidator>,
        documents: &Documents,
    ) -> DocumentStoreResult<Vec<Document>> {
        documents
            .clone()
            .into_iter()
            .map(|mut document| {
                document.remove(ID_FIELD);

                let Some(validator) = validator else {
                    return Ok(document);
                };

                let document = validator.strings_to_ids(validator.restrict(document))?;
                validator
                    .validate(&document)
                    .map_err(|errors| self.rejected(errors))?;

                Ok(document)
            })
            .collect()
    }

    /// Inserts documents exactly as given and returns them as stored.
    pub async fn create_with_no_validation(
        &self,
        documents: impl Into<Documents>,
    ) -> DocumentStoreResult<Documents> {
        let documents = documents.into();
        let backend = self.backend()?;

        if documents.is_empty() {
            return Ok(documents);
        }

        debug!(collection = %self.name, count = documents.len(), "creating documents without validation");

        let stored = backend
            .insert_documents(documents.clone().into_vec(), &self.name)
            .await?;

        Ok(documents.reshape(stored))
    }

    /// Applies the fields of `document` to the stored document with the same `_id`.
    ///
    /// Only the fields present are validated. Returns the document as it is after
    /// the update.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::MissingId`] if `document` has no `_id`
    /// - [`DocumentStoreError::InvalidId`] if the `_id` is malformed
    /// - [`DocumentStoreError::Validation`] if a present field is rejected
    /// - [`DocumentStoreError::DocumentMissing`] if no document has that `_id`
    pub async fn update(
        &self,
        document: Document,
        options: impl Into<Option<FindAndModifyOptions>>,
    ) -> DocumentStoreResult<Document> {
        let backend = self.backend()?;

        let id = match document.get(ID_FIELD) {
            None | Some(Bson::Null) => None,
            Some(Bson::String(s)) if s.is_empty() => None,
            Some(id) => Some(id),
        }
        .ok_or_else(|| DocumentStoreError::MissingId(self.name.clone()))?;
        let id = oid::object_id(id, &self.name)?;

        let mut patch = document;
        patch.remove(ID_FIELD);
        let patch = self.prepare_patch(patch)?;

        let updated = match patch.is_empty() {
            true => {
                debug!(collection = %self.name, id = %id, "nothing to update, reading document");

                backend
                    .find_documents(
                        id_selector(id),
                        FindOptions {
                            limit: Some(1),
                            ..FindOptions::default()
                        },
                        &self.name,
                    )
                    .await?
                    .into_iter()
                    .next()
            }
            false => {
                debug!(collection = %self.name, id = %id, "updating document");

                backend
                    .find_one_and_update(
                        id_selector(id),
                        doc! { "$set": patch },
                        options.into().unwrap_or_default(),
                        &self.name,
                    )
                    .await?
            }
        };

        updated
            .map(|document| self.ids_to_strings(document))
            .ok_or_else(|| DocumentStoreError::DocumentMissing {
                id: id.to_hex(),
                collection: self.name.clone(),
            })
    }

    /// Partially validates an update patch and converts its identifier fields.
    fn prepare_patch(&self, patch: Document) -> DocumentStoreResult<Document> {
        let Some(validator) = self.validator.as_deref() else {
            return Ok(patch);
        };

        validator
            .partial_validate(&patch)
            .map_err(|errors| self.rejected(errors))?;

        validator.strings_to_ids(match validator.dialect() {
            Dialect::FieldMap => validator.restrict(patch),
            Dialect::JsonSchema => patch,
        })
    }

    /// Applies `patch` to every document whose `_id` is in `ids`.
    pub async fn update_by_ids<I>(
        &self,
        ids: I,
        patch: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> DocumentStoreResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Bson>,
    {
        let ids = ids
            .into_iter()
            .map(|id| self.object_id(id))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.update_with_selector(ids_selector(ids), patch, options)
            .await
    }

    /// Partially validates `patch` and `$set`s it on every document matching `selector`.
    pub async fn update_with_selector(
        &self,
        selector: Document,
        patch: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> DocumentStoreResult<()> {
        let backend = self.backend()?;
        let options = UpdateOptions {
            multi: true,
            ..options.into().unwrap_or_default()
        };
        let patch = self.prepare_patch(patch)?;
        if patch.is_empty() {
            return Ok(());
        }

        debug!(collection = %self.name, "updating documents by selector");

        backend
            .update_documents(selector, doc! { "$set": patch }, options, &self.name)
            .await?;

        Ok(())
    }

    /// `$set`s `patch` on every document matching `selector` without any checks.
    ///
    /// Updates every match unless `options` says otherwise.
    pub async fn update_with_selector_no_validation(
        &self,
        selector: Document,
        patch: Document,
        options: impl Into<Option<UpdateOptions>>,
    ) -> DocumentStoreResult<UpdateResult> {
        let backend = self.backend()?;
        let options = options.into().unwrap_or_else(UpdateOptions::multi);

        debug!(collection = %self.name, multi = options.multi, "updating documents without validation");

        backend
            .update_documents(selector, doc! { "$set": patch }, options, &self.name)
            .await
    }

    /// Atomically applies a raw update document to the first match of `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when nothing matches.
    pub async fn find_and_modify(
        &self,
        selector: Document,
        update: Document,
        options: impl Into<Option<FindAndModifyOptions>>,
    ) -> DocumentStoreResult<Document> {
        let backend = self.backend()?;

        debug!(collection = %self.name, "finding and modifying document");

        backend
            .find_one_and_update(
                selector.clone(),
                update,
                options.into().unwrap_or_default(),
                &self.name,
            )
            .await?
            .map(|document| self.present(document))
            .ok_or_else(|| self.not_found(selector))
    }

    /// Partially validates `patch` and `$set`s it on the first match of `selector`,
    /// inserting a new document when nothing matches.
    ///
    /// Returns the document as it is after the write.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Validation`] if a field of `patch` is rejected
    /// - [`DocumentStoreError::InvalidDocument`] if `patch` has nothing to set
    pub async fn upsert(&self, selector: Document, patch: Document) -> DocumentStoreResult<Document> {
        let patch = self.prepare_patch(patch)?;
        if patch.is_empty() {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "upsert into {} needs at least one field to set",
                self.name
            )));
        }

        let selector = self.convert_query(selector)?;

        debug!(collection = %self.name, "upserting document");

        self.find_and_modify(
            selector,
            doc! { "$set": patch },
            FindAndModifyOptions::default().with_upsert(true),
        )
        .await
    }

    /// Returns the first document matching `query`, creating `query` merged with
    /// `extra` when there is none.
    ///
    /// The merged document is checked against the schema before the lookup, so
    /// undeclared fields are rejected whether or not a match exists.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidDocument`] if `query` uses operators
    /// - [`DocumentStoreError::Validation`] if the merged document is rejected
    pub async fn ensure(
        &self,
        query: Document,
        extra: impl Into<Option<Document>>,
    ) -> DocumentStoreResult<Document> {
        if has_operator(&query) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "ensure on {} needs a plain equality query",
                self.name
            )));
        }

        let mut merged = query.clone();
        for (key, value) in extra.into().unwrap_or_default() {
            merged.insert(key, value);
        }

        if let Some(validator) = self.validator.as_deref() {
            validator
                .partial_validate(&merged)
                .map_err(|errors| self.rejected(errors))?;
        }

        match self.find_one(query, None).await {
            Ok(found) => Ok(found),
            Err(DocumentStoreError::NotFound { .. }) => {
                debug!(collection = %self.name, "ensured document missing, creating it");

                self.create(merged)
                    .await?
                    .one()
                    .ok_or_else(|| {
                        DocumentStoreError::Backend(format!("store returned no document for {}", self.name))
                    })
            }
            Err(err) => Err(err),
        }
    }

    /// Returns every document matching `query`.
    ///
    /// String identifiers in `query` are converted to native form unless the query
    /// uses operators.
    pub async fn find(
        &self,
        query: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let backend = self.backend()?;
        let query = self.convert_query(query)?;

        debug!(collection = %self.name, "finding documents");

        Ok(backend
            .find_documents(query, options.into().unwrap_or_default(), &self.name)
            .await?
            .into_iter()
            .map(|document| self.present(document))
            .collect())
    }

    /// Returns the documents matching `query` as stored, with `_id`s stringified.
    pub async fn find_with_no_validation(
        &self,
        query: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> DocumentStoreResult<Vec<Document>> {
        let backend = self.backend()?;

        debug!(collection = %self.name, "finding documents without validation");

        Ok(backend
            .find_documents(query, options.into().unwrap_or_default(), &self.name)
            .await?
            .into_iter()
            .map(|document| self.ids_to_strings(document))
            .collect())
    }

    /// Returns the first document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] with the converted query when nothing matches.
    pub async fn find_one(
        &self,
        query: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> DocumentStoreResult<Document> {
        let backend = self.backend()?;
        let query = self.convert_query(query)?;
        let options = FindOptions {
            limit: Some(1),
            ..options.into().unwrap_or_default()
        };

        debug!(collection = %self.name, "finding one document");

        backend
            .find_documents(query.clone(), options, &self.name)
            .await?
            .into_iter()
            .next()
            .map(|document| self.present(document))
            .ok_or_else(|| self.not_found(query))
    }

    pub async fn find_by_id(&self, id: impl Into<Bson>) -> DocumentStoreResult<Document> {
        let id = self.object_id(id)?;

        self.find_one(id_selector(id), None).await
    }

    /// Returns the documents whose `_id` is in `ids`. Unknown ids are skipped.
    pub async fn find_by_ids<I>(&self, ids: I) -> DocumentStoreResult<Vec<Document>>
    where
        I: IntoIterator,
        I::Item: Into<Bson>,
    {
        let ids = ids
            .into_iter()
            .map(|id| self.object_id(id))
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(self
            .find_with_no_validation(ids_selector(ids), None)
            .await?
            .into_iter()
            .map(|document| self.format(document))
            .collect())
    }

    /// Deletes every document matching `query`.
    pub async fn remove(&self, query: Document) -> DocumentStoreResult<()> {
        let backend = self.backend()?;
        let query = self.convert_query(query)?;

        let removed = backend.delete_documents(query, &self.name).await?;
        debug!(collection = %self.name, removed, "removed documents");

        Ok(())
    }

    pub async fn remove_by_id(&self, id: impl Into<Bson>) -> DocumentStoreResult<()> {
        let backend = self.backend()?;
        let id = self.object_id(id)?;

        let removed = backend
            .delete_documents(id_selector(id), &self.name)
            .await?;
        debug!(collection = %self.name, id = %id, removed, "removed document");

        Ok(())
    }

    /// Removes a single field from one document. No schema checks are made.
    pub async fn unset_field(&self, id: impl Into<Bson>, field: &str) -> DocumentStoreResult<()> {
        let backend = self.backend()?;
        let id = self.object_id(id)?;

        debug!(collection = %self.name, id = %id, field, "unsetting field");

        backend
            .update_documents(
                id_selector(id),
                doc! { "$unset": { field: "" } },
                UpdateOptions::default(),
                &self.name,
            )
            .await?;

        Ok(())
    }

    pub async fn count(&self, query: Document) -> DocumentStoreResult<u64> {
        let backend = self.backend()?;
        let query = self.convert_query(query)?;

        backend.count_documents(query, &self.name).await
    }

    /// Ensures every index in `specs` exists on the collection.
    ///
    /// Stops at, logs and returns the first failure.
    pub async fn indices<I>(&self, specs: I) -> DocumentStoreResult<()>
    where
        I: IntoIterator,
        I::Item: Into<IndexSpec>,
    {
        let backend = self.backend()?;

        for spec in specs.into_iter().map(Into::into) {
            let name = spec.index_name();
            debug!(collection = %self.name, index = %name, "ensuring index");

            if let Err(err) = backend.ensure_index(spec, &self.name).await {
                error!(collection = %self.name, index = %name, error = %err, "failed to ensure index");
                return Err(err);
            }
        }

        Ok(())
    }

    /// Alias of [`Model::indices`].
    pub async fn indexes<I>(&self, specs: I) -> DocumentStoreResult<()>
    where
        I: IntoIterator,
        I::Item: Into<IndexSpec>,
    {
        self.indices(specs).await
    }

    /// Names of the collection's indexes, `_id_` included.
    pub async fn list_indexes(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend()?.list_indexes(&self.name).await
    }

    fn backend(&self) -> DocumentStoreResult<&dyn DynStoreBackend> {
        match &self.database {
            Some(database) => Ok(database.backend()),
            None => {
                warn!(collection = %self.name, "no database configured");
                Err(DocumentStoreError::NoDatabase(self.name.clone()))
            }
        }
    }

    fn convert_query(&self, query: Document) -> DocumentStoreResult<Document> {
        let query = match has_operator(&query) {
            true => query,
            false => match self.validator.as_deref() {
                Some(validator) => validator.schema().strings_to_ids(query),
                None => Schema::default().strings_to_ids(query),
            },
        };

        match self.validator.as_deref() {
            Some(validator) if validator.dialect() == Dialect::FieldMap => {
                validator.strings_to_ids(query)
            }
            _ => Ok(query),
        }
    }

    fn ids_to_strings(&self, document: Document) -> Document {
        match self.validator.as_deref() {
            Some(validator) => validator.ids_to_strings(document),
            None => Schema::default().ids_to_strings(document),
        }
    }

    fn format(&self, document: Document) -> Document {
        match &self.formatter {
            Some(formatter) => formatter(document),
            None => document,
        }
    }

    fn present(&self, document: Document) -> Document {
        self.format(self.ids_to_strings(document))
    }

    fn rejected(&self, errors: ValidationErrors) -> DocumentStoreError {
        warn!(collection = %self.name, errors = %errors, "document rejected by schema");
        DocumentStoreError::Validation(errors)
    }

    fn not_found(&self, query: Document) -> DocumentStoreError {
        DocumentStoreError::NotFound {
            query,
            collection: self.name.clone(),
        }
    }
}

/// Builder for [`Model`].
pub struct ModelBuilder {
    name: String,
    validator: Option<Arc<dyn SchemaValidator>>,
    json_schema: Option<Value>,
    formatter: Option<OutputFormatter>,
    database: Option<Database>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            validator: None,
            json_schema: None,
            formatter: None,
            database: None,
        }
    }

    /// Sets the schema validator.
    pub fn schema(mut self, validator: impl SchemaValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self.json_schema = None;
        self
    }

    /// Shares an already built validator with other models.
    pub fn shared_schema(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self.json_schema = None;
        self
    }

    /// Sets a JSON-Schema-like declaration, parsed on [`build`](ModelBuilder::build).
    pub fn json_schema(mut self, declaration: Value) -> Self {
        self.json_schema = Some(declaration);
        self.validator = None;
        self
    }

    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn output_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MissingCollectionName`] for an empty name and
    /// [`DocumentStoreError::InvalidSchema`] for a declaration that cannot be parsed.
    pub fn build(self) -> DocumentStoreResult<Model> {
        if self.name.is_empty() {
            return Err(DocumentStoreError::MissingCollectionName);
        }

        let validator = match self.json_schema {
            Some(declaration) => Some(Arc::new(JsonSchema::from_value(Some(&self.name), &declaration)?)
                as Arc<dyn SchemaValidator>),
            None => self.validator,
        };

        Ok(Model {
            name: self.name,
            validator,
            formatter: self.formatter,
            database: self.database,
        })
    }
}
