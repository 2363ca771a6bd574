//! Translation of docmodel options into MongoDB driver options.

use bson::Document;
use mongodb::{
    IndexModel,
    options::{
        FindOneAndUpdateOptions, FindOptions as MongoFindOptions, IndexOptions, ReturnDocument,
        UpdateOptions as MongoUpdateOptions,
    },
};

use docmodel_core::{
    index::IndexSpec,
    query::{FindAndModifyOptions, FindOptions, Sort, UpdateOptions, sort_document},
};

fn sort(keys: &[Sort]) -> Option<Document> {
    (!keys.is_empty()).then(|| sort_document(keys))
}

pub(crate) fn find_options(options: FindOptions) -> MongoFindOptions {
    let mut translated = MongoFindOptions::default();

    translated.projection = options.projection;
    translated.sort = sort(&options.sort);
    translated.skip = options.skip;
    translated.limit = options.limit;

    translated
}

/// Always asks for the document as it is after the update.
pub(crate) fn find_one_and_update_options(options: FindAndModifyOptions) -> FindOneAndUpdateOptions {
    let mut translated = FindOneAndUpdateOptions::default();

    translated.return_document = Some(ReturnDocument::After);
    translated.upsert = Some(options.upsert);
    translated.sort = sort(&options.effective_sort());

    translated
}

pub(crate) fn update_options(options: &UpdateOptions) -> MongoUpdateOptions {
    let mut translated = MongoUpdateOptions::default();
    translated.upsert = Some(options.upsert);
    translated
}

pub(crate) fn index_model(index: IndexSpec) -> IndexModel {
    let mut options = IndexOptions::default();

    options.unique = Some(index.unique);
    options.sparse = index.sparse.then_some(true);
    options.name = index.name;

    IndexModel::builder()
        .keys(index.keys)
        .options(options)
        .build()
}
