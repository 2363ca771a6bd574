//! In-memory storage implementation.
//!
//! Collections are kept as insertion-ordered lists of BSON documents behind an
//! async-safe read-write lock. Writes against one collection are applied
//! atomically: a write that would violate a unique index leaves the collection
//! untouched.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{ID_INDEX_NAME, IndexSpec},
    query::{FindAndModifyOptions, FindOptions, UpdateOptions, UpdateResult},
    schema::ID_FIELD,
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents, lookup},
    update::{apply_update, project, upsert_seed},
};

#[derive(Debug, Default, Clone)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    /// Positions of the documents matching `selector`, in insertion order.
    fn matching(&self, selector: &Document) -> DocumentStoreResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(selector)? {
                positions.push(position);
            }
        }

        Ok(positions)
    }

    /// Fails if `candidate` collides on `_id` or on a unique index with any stored
    /// document other than the one at `replacing`.
    fn check_unique(
        &self,
        candidate: &Document,
        replacing: Option<usize>,
        name: &str,
    ) -> DocumentStoreResult<()> {
        let others = self
            .documents
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != replacing)
            .map(|(_, document)| document);

        for other in others {
            if candidate.get(ID_FIELD) == other.get(ID_FIELD) {
                return Err(duplicate(name, ID_INDEX_NAME, candidate.get(ID_FIELD)));
            }

            for index in self.indexes.iter().filter(|index| index.unique) {
                if let Some(key) = unique_key(index, candidate) {
                    if unique_key(index, other).as_ref() == Some(&key) {
                        return Err(duplicate(name, &index.index_name(), key.first().and_then(Option::as_ref)));
                    }
                }
            }
        }

        Ok(())
    }

    /// Stores `document`, assigning an `_id` first if it has none.
    fn insert(&mut self, document: Document, name: &str) -> DocumentStoreResult<Document> {
        let document = with_id(document);
        self.check_unique(&document, None, name)?;
        self.documents.push(document.clone());

        Ok(document)
    }

    /// Applies `update` to the document at `position`, returning whether it changed.
    fn update_at(
        &mut self,
        position: usize,
        update: &Document,
        name: &str,
    ) -> DocumentStoreResult<bool> {
        let mut updated = self.documents[position].clone();
        let changed = apply_update(&mut updated, update)?;

        if changed {
            self.check_unique(&updated, Some(position), name)?;
            self.documents[position] = updated;
        }

        Ok(changed)
    }

    /// Inserts the document an upsert describes and returns it.
    fn upsert(&mut self, selector: &Document, update: &Document, name: &str) -> DocumentStoreResult<Document> {
        let mut seeded = upsert_seed(selector);
        apply_update(&mut seeded, update)?;

        self.insert(seeded, name)
    }
}

/// The values a unique index keys `document` on, or `None` when a sparse index skips it.
fn unique_key(index: &IndexSpec, document: &Document) -> Option<Vec<Option<Bson>>> {
    let key = index
        .fields()
        .into_iter()
        .map(|field| lookup(document, field).cloned())
        .collect::<Vec<_>>();

    match index.sparse && key.iter().all(Option::is_none) {
        true => None,
        false => Some(key),
    }
}

fn with_id(document: Document) -> Document {
    if document.contains_key(ID_FIELD) {
        return document;
    }

    let mut stored = Document::new();
    stored.insert(ID_FIELD, ObjectId::new());
    for (key, value) in document {
        stored.insert(key, value);
    }
    stored
}

fn duplicate(collection: &str, index: &str, key: Option<&Bson>) -> DocumentStoreError {
    DocumentStoreError::DuplicateKey(format!(
        "E11000 duplicate key error collection: {collection} index: {index} dup key: {}",
        key.map(ToString::to_string).unwrap_or_else(|| "null".into())
    ))
}

type StoreMap = HashMap<String, Collection>;

#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Runs `write` against a copy of the collection and keeps the copy only on success.
    async fn write<T>(
        &self,
        collection: &str,
        write: impl FnOnce(&mut Collection) -> DocumentStoreResult<T>,
    ) -> DocumentStoreResult<T> {
        let mut store = self.store.write().await;
        let mut staged = store.get(collection).cloned().unwrap_or_default();

        let output = write(&mut staged)?;
        store.insert(collection.to_string(), staged);

        Ok(output)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        let stored = self
            .write(collection, |target| {
                documents
                    .into_iter()
                    .map(|document| target.insert(document, collection))
                    .collect::<DocumentStoreResult<Vec<_>>>()
            })
            .await?;

        debug!(target: "docmodel::memory", collection, count = stored.len(), "inserted documents");

        Ok(stored)
    }

    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(target) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut found = target
            .matching(&selector)?
            .into_iter()
            .map(|position| &target.documents[position])
            .collect::<Vec<_>>();

        if !options.sort.is_empty() {
            found.sort_by(|a, b| compare_documents(a, b, &options.sort));
        }

        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(limit) => limit.unsigned_abs() as usize,
        };

        Ok(found
            .into_iter()
            .skip(options.skip.unwrap_or(0) as usize)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(document.clone(), projection),
                None => document.clone(),
            })
            .collect())
    }

    async fn find_one_and_update(
        &self,
        selector: Document,
        update: Document,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        self.write(collection, |target| {
            let sort = options.effective_sort();
            let first = target
                .matching(&selector)?
                .into_iter()
                .min_by(|a, b| compare_documents(&target.documents[*a], &target.documents[*b], &sort));

            match first {
                Some(position) => {
                    target.update_at(position, &update, collection)?;
                    Ok(Some(target.documents[position].clone()))
                }
                None if options.upsert => target.upsert(&selector, &update, collection).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn update_documents(
        &self,
        selector: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let result = self
            .write(collection, |target| {
                let mut positions = target.matching(&selector)?;
                if !options.multi {
                    positions.truncate(1);
                }

                let mut result = UpdateResult {
                    matched_count: positions.len() as u64,
                    ..UpdateResult::default()
                };

                for position in positions {
                    if target.update_at(position, &update, collection)? {
                        result.modified_count += 1;
                    }
                }

                if result.matched_count == 0 && options.upsert {
                    let inserted = target.upsert(&selector, &update, collection)?;
                    result.upserted_id = inserted.get(ID_FIELD).cloned();
                }

                Ok(result)
            })
            .await?;

        debug!(
            target: "docmodel::memory",
            collection,
            matched = result.matched_count,
            modified = result.modified_count,
            "updated documents"
        );

        Ok(result)
    }

    async fn delete_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        self.write(collection, |target| {
            let positions = target.matching(&selector)?;
            let mut position = 0;

            target.documents.retain(|_| {
                let keep = !positions.contains(&position);
                position += 1;
                keep
            });

            Ok(positions.len() as u64)
        })
        .await
    }

    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(target) => Ok(target.matching(&selector)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn ensure_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        let name = index.index_name();

        self.write(collection, |target| {
            if name == ID_INDEX_NAME || target.indexes.iter().any(|known| known.index_name() == name) {
                return Ok(());
            }

            target.indexes.push(index);

            // Existing documents must already satisfy a new unique index.
            for position in 0..target.documents.len() {
                let document = target.documents[position].clone();
                target.check_unique(&document, Some(position), collection)?;
            }

            Ok(())
        })
        .await?;

        debug!(target: "docmodel::memory", collection, index = %name, "ensured index");

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        let store = self.store.read().await;
        let Some(target) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(std::iter::once(ID_INDEX_NAME.to_string())
            .chain(target.indexes.iter().map(IndexSpec::index_name))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

impl InMemoryStoreBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
