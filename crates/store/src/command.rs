//! Command orchestrator: fold declared streams into state, hand them to a
//! user handler, and route resulting events back through the append
//! protocol.

use std::sync::Arc;

use indexmap::IndexMap;
use vorfall_core::error::VorfallResult;
use vorfall_core::event::DomainEvent;
use vorfall_core::subject::{self, StreamSubject};

use crate::stream_store::{AppendResult, StreamStore};

/// `() -> S`, captured once per declared stream.
pub type InitialStateFn<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// `(S, &DomainEvent) -> S`, captured once per declared stream.
pub type EvolveFn<S> = Arc<dyn Fn(S, &DomainEvent) -> S + Send + Sync>;

/// One stream to aggregate before invoking the command handler.
///
/// Every declared stream in a single [`handle_command`] call shares the
/// same state type `S` — folding streams of genuinely different shapes in
/// one command belongs to two separate `handle_command` calls, not one
/// heterogeneous aggregation (see DESIGN.md).
#[derive(Clone)]
pub struct StreamDeclaration<S> {
    pub stream_subject: String,
    pub initial_state: InitialStateFn<S>,
    pub evolve: EvolveFn<S>,
}

impl<S> StreamDeclaration<S> {
    pub fn new(
        stream_subject: impl Into<String>,
        initial_state: impl Fn() -> S + Send + Sync + 'static,
        evolve: impl Fn(S, &DomainEvent) -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            stream_subject: stream_subject.into(),
            initial_state: Arc::new(initial_state),
            evolve: Arc::new(evolve),
        }
    }
}

/// A command handler's result, normalized to a sequence before being routed
/// to the append protocol.
pub enum HandlerOutcome<E> {
    One(E),
    Many(Vec<E>),
}

impl<E> HandlerOutcome<E> {
    fn into_events(self) -> Vec<E> {
        match self {
            HandlerOutcome::One(event) => vec![event],
            HandlerOutcome::Many(events) => events,
        }
    }
}

/// Aggregate every declared stream in order, invoke `command_handler`, and
/// append whatever events it produces.
///
/// Aggregation is sequential, never parallel, so handler logic can depend
/// on earlier streams having already been folded. The append step accepts
/// events targeting streams that were never declared — declaration is an
/// aggregation request, not a write allow-list.
pub async fn handle_command<S, C, E, F>(
    store: &StreamStore,
    streams: Vec<StreamDeclaration<S>>,
    command: &C,
    command_handler: F,
) -> VorfallResult<AppendResult>
where
    E: Into<DomainEvent>,
    F: FnOnce(&C, &IndexMap<StreamSubject, S>) -> VorfallResult<HandlerOutcome<E>>,
{
    let mut states: IndexMap<StreamSubject, S> = IndexMap::new();

    for declaration in streams {
        let stream_subject = subject::parse_stream_subject(&declaration.stream_subject)?;
        let state = store
            .aggregate_stream(&declaration.stream_subject, declaration.initial_state.as_ref(), declaration.evolve.as_ref())
            .await?;
        states.insert(stream_subject, state);
    }

    let outcome = command_handler(command, &states)?;
    let events: Vec<DomainEvent> = outcome.into_events().into_iter().map(Into::into).collect();

    store.append_or_create_stream(events).await
}
