//! MongoDB-backed stream store: the transactional, projection-aware append
//! protocol at the center of this crate.

use std::collections::HashSet;

use bson::{doc, Bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::{ClientSession, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::{instrument, Span};
use uuid::Uuid;
use vorfall_core::error::{VorfallError, VorfallResult};
use vorfall_core::event::{group_events_by_stream_subject, DomainEvent};
use vorfall_core::subject::{self, StreamSubject};
use vorfall_events::registry::ProjectionRegistry;

/// `metadata.{createdAt, updatedAt}` on a stream document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamMetadata {
    #[serde(rename = "createdAt")]
    pub created_at: bson::DateTime,
    #[serde(rename = "updatedAt")]
    pub updated_at: bson::DateTime,
}

/// One persisted stream: `{streamId, streamSubject, events, metadata, projections?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDocument {
    #[serde(rename = "streamId")]
    pub stream_id: Uuid,

    #[serde(rename = "streamSubject")]
    pub stream_subject: String,

    pub events: Vec<DomainEvent>,

    pub metadata: StreamMetadata,

    #[serde(default)]
    pub projections: Document,
}

/// Result of [`StreamStore::read_stream`].
#[derive(Debug, Clone)]
pub struct ReadStreamResult {
    pub events: Vec<DomainEvent>,
    pub stream_exists: bool,
}

/// One stream's outcome from an append, exposed alongside the aggregate
/// totals in [`AppendResult`].
#[derive(Debug, Clone)]
pub struct AppendedStream {
    pub stream_subject: StreamSubject,
    pub document: StreamDocument,
}

/// Result of [`StreamStore::append_or_create_stream`].
#[derive(Debug, Clone)]
pub struct AppendResult {
    pub streams: Vec<AppendedStream>,
    pub total_events_appended: usize,
    pub stream_subjects: Vec<StreamSubject>,
}

/// Transactional, projection-aware event store over a single MongoDB
/// database. Holds one logical client; the projection registry captured at
/// construction is the only state shared across calls.
#[derive(Clone)]
pub struct StreamStore {
    client: mongodb::Client,
    database: Database,
    registry: ProjectionRegistry,
}

impl StreamStore {
    pub fn new(client: mongodb::Client, database: Database, registry: ProjectionRegistry) -> Self {
        Self { client, database, registry }
    }

    pub fn registry(&self) -> &ProjectionRegistry {
        &self.registry
    }

    /// The collection holding documents for `subject`'s first segment. Pure
    /// computation — no IO.
    pub fn collection_for(&self, subject_str: &str) -> VorfallResult<Collection<StreamDocument>> {
        let subject = subject::parse_subject(subject_str)?;
        let name = subject::collection_of(&subject)?;
        Ok(self.database.collection(&name))
    }

    fn collection_for_stream_subject(&self, stream_subject: &StreamSubject) -> Collection<StreamDocument> {
        let name = stream_subject
            .as_str()
            .split('/')
            .next()
            .expect("StreamSubject always has a first segment");
        self.database.collection(name)
    }

    /// Normalize `subject` to its stream subject and return its events, or
    /// an empty list with `stream_exists = false` if no document exists.
    #[instrument(skip(self), fields(subject = %subject_str), err)]
    pub async fn read_stream(&self, subject_str: &str) -> VorfallResult<ReadStreamResult> {
        let subject = subject::parse_subject(subject_str)?;
        let stream_subject = subject::stream_subject_of(&subject)?;
        let collection = self.collection_for_stream_subject(&stream_subject);

        let found = collection
            .find_one(doc! { "streamSubject": stream_subject.as_str() }, None)
            .await
            .map_err(map_mongo_error)?;

        match found {
            Some(document) => Ok(ReadStreamResult { events: document.events, stream_exists: true }),
            None => Ok(ReadStreamResult { events: Vec::new(), stream_exists: false }),
        }
    }

    /// Fold `initial_state()` over a stream's events in stored order. A
    /// missing stream folds over an empty slice, returning `initial_state()`
    /// unchanged.
    pub async fn aggregate_stream<S>(
        &self,
        stream_subject_str: &str,
        initial_state: impl Fn() -> S,
        evolve: impl Fn(S, &DomainEvent) -> S,
    ) -> VorfallResult<S> {
        let read = self.read_stream(stream_subject_str).await?;
        let mut state = initial_state();
        for event in &read.events {
            state = evolve(state, event);
        }
        Ok(state)
    }

    /// The append protocol: group events by stream subject, then within one
    /// transaction upsert each stream's events and recompute its applicable
    /// projections. All-or-nothing across every touched stream.
    #[instrument(skip(self, events), fields(event_count = events.len(), stream_count = tracing::field::Empty), err)]
    pub async fn append_or_create_stream(&self, events: Vec<DomainEvent>) -> VorfallResult<AppendResult> {
        if events.is_empty() {
            return Err(VorfallError::EmptyBatch);
        }
        let total_events_appended = events.len();

        let groups = group_events_by_stream_subject(events)?;
        let stream_subjects: Vec<StreamSubject> = groups.keys().cloned().collect();

        let span = Span::current();
        span.record("stream_count", groups.len());

        let mut session = self.client.start_session(None).await.map_err(map_mongo_error)?;
        session.start_transaction(None).await.map_err(map_mongo_error)?;

        let mut streams = Vec::with_capacity(groups.len());
        for (stream_subject, bucket) in groups {
            match self.append_bucket(&mut session, &stream_subject, bucket).await {
                Ok(document) => streams.push(AppendedStream { stream_subject, document }),
                Err(err) => {
                    let _ = session.abort_transaction().await;
                    return Err(err);
                }
            }
        }

        session.commit_transaction().await.map_err(map_mongo_error)?;

        Ok(AppendResult { streams, total_events_appended, stream_subjects })
    }

    async fn append_bucket(
        &self,
        session: &mut ClientSession,
        stream_subject: &StreamSubject,
        events: Vec<DomainEvent>,
    ) -> VorfallResult<StreamDocument> {
        let collection = self.collection_for_stream_subject(stream_subject);
        let filter = doc! { "streamSubject": stream_subject.as_str() };
        let now = bson::DateTime::now();

        let event_docs: Vec<Bson> = events
            .iter()
            .map(|event| bson::to_bson(event).map_err(|e| VorfallError::storage(e.to_string())))
            .collect::<VorfallResult<_>>()?;

        let update = doc! {
            "$setOnInsert": {
                "streamId": Uuid::new_v4(),
                "streamSubject": stream_subject.as_str(),
                "metadata.createdAt": now,
            },
            "$set": { "metadata.updatedAt": now },
            "$push": { "events": { "$each": event_docs } },
        };

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let after = collection
            .find_one_and_update_with_session(filter.clone(), update, options, session)
            .await
            .map_err(map_mongo_error)?
            .ok_or_else(|| VorfallError::upsert_unexpectedly_missing(stream_subject.as_str()))?;

        let event_types: HashSet<String> = events.iter().map(|e| e.event_type.clone()).collect();
        let applicable = self.registry.applicable_for(&event_types);
        if applicable.is_empty() {
            return Ok(after);
        }

        let event_refs: Vec<&DomainEvent> = events.iter().collect();
        let mut projection_updates = Document::new();
        for definition in &applicable {
            let prior = after.projections.get(&definition.name).cloned();
            let state = definition.fold(prior, &event_refs);
            projection_updates.insert(format!("projections.{}", definition.name), state);
        }

        let projection_options =
            FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();

        let after_projections = collection
            .find_one_and_update_with_session(
                filter,
                doc! { "$set": projection_updates },
                projection_options,
                session,
            )
            .await
            .map_err(map_mongo_error)?
            .ok_or_else(|| VorfallError::upsert_unexpectedly_missing(stream_subject.as_str()))?;

        Ok(after_projections)
    }
}

/// Map a driver-level error onto the taxonomy's one catch-all variant. The
/// driver error itself is kept in the message; nothing here is parsed back
/// into a recovered state.
pub fn map_mongo_error(err: mongodb::error::Error) -> VorfallError {
    VorfallError::storage(err.to_string())
}
