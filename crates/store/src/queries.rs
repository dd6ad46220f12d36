//! Read-side projection queries: `findOneProjection`, `findMultipleProjections`,
//! `countProjections`, from spec.md §4.7.

use bson::{doc, Bson, Document};
use mongodb::options::FindOptions;
use tracing::instrument;
use vorfall_core::error::{VorfallError, VorfallResult};
use vorfall_core::subject;
use vorfall_events::filter::{rewrite_filter, rewrite_sort};

use crate::stream_store::{map_mongo_error, StreamDocument, StreamStore};

/// Options for [`find_one_projection`].
#[derive(Debug, Clone, Default)]
pub struct FindOneProjectionOptions {
    pub projection_query: Option<Document>,
    /// When true, the `streamSubject` constraint is dropped — the caller is
    /// searching across every stream in the collection.
    pub match_all: bool,
}

/// Options shared by [`find_multiple_projections`] and [`count_projections`].
#[derive(Debug, Clone, Default)]
pub struct ProjectionQueryOptions {
    pub projection_query: Option<Document>,
}

/// Pagination/sort for [`find_multiple_projections`].
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub sort: Option<Document>,
}

fn combine(conditions: Vec<Document>) -> Document {
    let mut conditions = conditions.into_iter().filter(|d| !d.is_empty());
    let first = conditions.next().unwrap_or_default();
    let rest: Vec<Document> = conditions.collect();
    if rest.is_empty() {
        first
    } else {
        let mut all = vec![first];
        all.extend(rest);
        doc! { "$and": all.into_iter().map(Bson::Document).collect::<Vec<_>>() }
    }
}

fn projection_slot(projection_name: &str) -> String {
    format!("projections.{projection_name}")
}

fn slot_exists_condition(slot: &str) -> Document {
    let mut condition = Document::new();
    condition.insert(slot, doc! { "$exists": true });
    condition
}

/// `findOneProjection`: the stream document carrying `projection_name`'s
/// slot for `stream_subject`, or `None` if no such document/slot exists.
#[instrument(skip(store, options), fields(stream_subject, projection_name), err)]
pub async fn find_one_projection(
    store: &StreamStore,
    stream_subject_str: &str,
    projection_name: &str,
    options: FindOneProjectionOptions,
) -> VorfallResult<Option<StreamDocument>> {
    let collection = store.collection_for(stream_subject_str)?;
    let slot = projection_slot(projection_name);

    let mut conditions = Vec::new();
    if !options.match_all {
        let stream_subject = subject::parse_stream_subject(stream_subject_str)?;
        conditions.push(doc! { "streamSubject": stream_subject.as_str() });
    }
    conditions.push(slot_exists_condition(&slot));
    if let Some(query) = options.projection_query {
        conditions.push(rewrite_filter(&query, &slot));
    }

    let filter = combine(conditions);
    collection.find_one(filter, None).await.map_err(map_mongo_error)
}

/// `findMultipleProjections`: materialized projection slot values (not the
/// surrounding stream documents) across every stream in `entity`'s
/// collection, after dropping documents whose slot is absent.
#[instrument(skip(store, options, pagination), fields(entity, projection_name), err)]
pub async fn find_multiple_projections(
    store: &StreamStore,
    entity: &str,
    projection_name: &str,
    options: ProjectionQueryOptions,
    pagination: Pagination,
) -> VorfallResult<Vec<Bson>> {
    if entity.contains('/') {
        return Err(VorfallError::invalid_entity(entity));
    }

    let slot = projection_slot(projection_name);
    let collection = store.collection_for(entity)?;

    let mut conditions = vec![slot_exists_condition(&slot)];
    if let Some(query) = options.projection_query {
        conditions.push(rewrite_filter(&query, &slot));
    }
    let filter = combine(conditions);

    let mut projection_mask = Document::new();
    projection_mask.insert(slot.as_str(), 1);
    let mut find_options = FindOptions::builder().projection(projection_mask).build();
    find_options.skip = pagination.skip;
    find_options.limit = pagination.limit;
    find_options.sort = pagination.sort.map(|sort| rewrite_sort(&sort, &slot));

    let mut cursor = collection
        .clone_with_type::<Document>()
        .find(filter, find_options)
        .await
        .map_err(map_mongo_error)?;

    let mut values = Vec::new();
    {
        use futures_util::stream::TryStreamExt;
        while let Some(document) = cursor.try_next().await.map_err(map_mongo_error)? {
            if let Some(value) = extract_projection_value(&document, projection_name) {
                if !matches!(value, Bson::Null) {
                    values.push(value);
                }
            }
        }
    }

    Ok(values)
}

/// `countProjections`: same filter shape as [`find_multiple_projections`],
/// without pagination.
#[instrument(skip(store, options), fields(entity, projection_name), err)]
pub async fn count_projections(
    store: &StreamStore,
    entity: &str,
    projection_name: &str,
    options: ProjectionQueryOptions,
) -> VorfallResult<u64> {
    if entity.contains('/') {
        return Err(VorfallError::invalid_entity(entity));
    }

    let slot = projection_slot(projection_name);
    let collection = store.collection_for(entity)?;

    let mut conditions = vec![slot_exists_condition(&slot)];
    if let Some(query) = options.projection_query {
        conditions.push(rewrite_filter(&query, &slot));
    }
    let filter = combine(conditions);

    collection
        .clone_with_type::<Document>()
        .count_documents(filter, None)
        .await
        .map_err(map_mongo_error)
}

fn extract_projection_value(document: &Document, projection_name: &str) -> Option<Bson> {
    document.get_document("projections").ok()?.get(projection_name).cloned()
}
