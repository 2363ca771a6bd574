use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{Acknowledgment, ClientOptions, CollectionOptions, WriteConcern},
};
use tracing::{debug, info};

use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    index::IndexSpec,
    query::{FindAndModifyOptions, FindOptions, UpdateOptions, UpdateResult},
    schema::ID_FIELD,
};

use crate::query::{find_one_and_update_options, find_options, index_model, update_options};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;
/// Server error code for an operation on a collection that does not exist.
const NAMESPACE_NOT_FOUND: i32 = 26;

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == DUPLICATE_KEY,
        ErrorKind::InsertMany(insert_error) => insert_error
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|e| e.code == DUPLICATE_KEY)),
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn store_error(err: MongoError) -> DocumentStoreError {
    match is_duplicate_key(&err) {
        true => DocumentStoreError::DuplicateKey(err.to_string()),
        false => DocumentStoreError::Backend(err.to_string()),
    }
}

fn write_concern(acknowledged: bool, journal: bool) -> WriteConcern {
    let mut concern = WriteConcern::default();

    match acknowledged {
        true => {
            concern.w = Some(Acknowledgment::Nodes(1));
            concern.journal = Some(journal);
        }
        false => concern.w = Some(Acknowledgment::Nodes(0)),
    }

    concern
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    write_concern: WriteConcern,
}

impl MongoDbStore {
    /// Wraps a connected client. Writes are acknowledged by one node and journaled.
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            write_concern: write_concern(true, true),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    /// Replaces the write concern applied to every collection.
    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = write_concern;
        self
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        let mut options = CollectionOptions::default();
        options.write_concern = Some(self.write_concern.clone());

        self.client
            .database(&self.database)
            .collection_with_options(collection_name, options)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        let documents = documents
            .into_iter()
            .map(|document| match document.contains_key(ID_FIELD) {
                true => document,
                false => {
                    let mut stored = Document::new();
                    stored.insert(ID_FIELD, ObjectId::new());
                    for (key, value) in document {
                        stored.insert(key, value);
                    }
                    stored
                }
            })
            .collect::<Vec<_>>();

        self.get_collection(collection)
            .insert_many(&documents)
            .await
            .map_err(store_error)?;

        debug!(collection, count = documents.len(), "inserted documents");

        Ok(documents)
    }

    async fn find_documents(
        &self,
        selector: Document,
        options: FindOptions,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        self.get_collection(collection)
            .find(selector)
            .with_options(find_options(options))
            .await
            .map_err(store_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(store_error)
    }

    async fn find_one_and_update(
        &self,
        selector: Document,
        update: Document,
        options: FindAndModifyOptions,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_update(selector, update)
            .with_options(find_one_and_update_options(options))
            .await
            .map_err(store_error)
    }

    async fn update_documents(
        &self,
        selector: Document,
        update: Document,
        options: UpdateOptions,
        collection: &str,
    ) -> DocumentStoreResult<UpdateResult> {
        let target = self.get_collection(collection);
        let translated = update_options(&options);

        let result = match options.multi {
            true => target
                .update_many(selector, update)
                .with_options(translated)
                .await,
            false => target
                .update_one(selector, update)
                .with_options(translated)
                .await,
        }
        .map_err(store_error)?;

        debug!(
            collection,
            matched = result.matched_count,
            modified = result.modified_count,
            "updated documents"
        );

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(selector)
            .await
            .map_err(store_error)?
            .deleted_count)
    }

    async fn count_documents(&self, selector: Document, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(selector)
            .await
            .map_err(store_error)
    }

    async fn ensure_index(&self, index: IndexSpec, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(index_model(index))
            .await
            .map_err(store_error)?;

        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> DocumentStoreResult<Vec<String>> {
        match self.get_collection(collection).list_index_names().await {
            Ok(names) => Ok(names),
            Err(err) => match err.kind.as_ref() {
                ErrorKind::Command(command_error) if command_error.code == NAMESPACE_NOT_FOUND => {
                    Ok(Vec::new())
                }
                _ => Err(store_error(err)),
            },
        }
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Connection settings for [`MongoDbStore`].
///
/// Writes default to being acknowledged by one node and journaled.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    acknowledged: bool,
    journal: bool,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            acknowledged: true,
            journal: true,
        }
    }

    /// Waits for writes to reach the on-disk journal. Ignored for unacknowledged writes.
    pub fn journal(mut self, journal: bool) -> Self {
        self.journal = journal;
        self
    }

    /// Waits for the server to acknowledge writes.
    pub fn acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = acknowledged;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(
            database = %self.database,
            acknowledged = self.acknowledged,
            journal = self.journal,
            "created MongoDB client"
        );

        Ok(MongoDbStore::new(client, self.database)
            .with_write_concern(write_concern(self.acknowledged, self.journal)))
    }
}
