//! Projection definitions: `{name, canHandle, evolve, initialState}`.
//!
//! A definition is pure and deterministic; its state type is opaque to the
//! store, which is why state is carried as [`bson::Bson`] — the type the
//! `mongodb` driver itself round-trips without a serde detour per fold
//! step.

use std::collections::HashSet;
use std::sync::Arc;

use bson::Bson;
use vorfall_core::DomainEvent;

/// `(state, event) -> state`. Must be pure and side-effect free — the
/// store assumes it is safe to call inside a transaction.
pub type Evolve = Arc<dyn Fn(Bson, &DomainEvent) -> Bson + Send + Sync>;

/// `() -> state`. Called when a projection's slot is absent for a stream.
pub type InitialState = Arc<dyn Fn() -> Bson + Send + Sync>;

/// A read-model definition maintained incrementally by folding a typed
/// subset of events.
///
/// `can_handle` is an explicit set of event-type tags, not a predicate
/// closure, so it is trivially serializable and testable (see spec.md
/// §4.4 "Notes").
#[derive(Clone)]
pub struct ProjectionDefinition {
    pub name: String,
    pub can_handle: HashSet<String>,
    pub evolve: Evolve,
    pub initial_state: InitialState,
}

impl ProjectionDefinition {
    pub fn new(
        name: impl Into<String>,
        can_handle: impl IntoIterator<Item = impl Into<String>>,
        evolve: impl Fn(Bson, &DomainEvent) -> Bson + Send + Sync + 'static,
        initial_state: impl Fn() -> Bson + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            can_handle: can_handle.into_iter().map(Into::into).collect(),
            evolve: Arc::new(evolve),
            initial_state: Arc::new(initial_state),
        }
    }

    /// Whether this projection reacts to any of the given event types.
    pub fn handles_any(&self, event_types: &HashSet<String>) -> bool {
        self.can_handle.iter().any(|t| event_types.contains(t))
    }

    /// Fold `prior_or_initial` over `events` in order, only applying the
    /// ones this projection declares it can handle.
    pub fn fold(&self, prior: Option<Bson>, events: &[&DomainEvent]) -> Bson {
        let mut state = prior.unwrap_or_else(|| (self.initial_state)());
        for event in events {
            if self.can_handle.contains(&event.event_type) {
                state = (self.evolve)(state, event);
            }
        }
        state
    }
}

impl core::fmt::Debug for ProjectionDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProjectionDefinition")
            .field("name", &self.name)
            .field("can_handle", &self.can_handle)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(event_type: &str) -> DomainEvent {
        DomainEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            subject: "veranstaltung/123/erstellt".to_string(),
            source: vorfall_core::EVENT_SOURCE_DEFAULT.to_string(),
            specversion: vorfall_core::SPECVERSION.to_string(),
            datacontenttype: vorfall_core::DATACONTENTTYPE.to_string(),
            date: Utc::now(),
            data: None,
            metadata: None,
        }
    }

    fn counting_projection() -> ProjectionDefinition {
        ProjectionDefinition::new(
            "TestProjection",
            ["veranstaltung.erstellt"],
            |state, _event| {
                let count = state
                    .as_document()
                    .and_then(|d| d.get_i32("count").ok())
                    .unwrap_or(0);
                Bson::from(bson::doc! { "count": count + 1 })
            },
            || Bson::from(bson::doc! { "count": 0 }),
        )
    }

    #[test]
    fn fold_starts_from_initial_state_when_absent() {
        let projection = counting_projection();
        let events = vec![event("veranstaltung.erstellt")];
        let refs: Vec<&DomainEvent> = events.iter().collect();
        let state = projection.fold(None, &refs);
        assert_eq!(state, Bson::from(bson::doc! { "count": 1 }));
    }

    #[test]
    fn fold_continues_from_prior_state() {
        let projection = counting_projection();
        let events = vec![event("veranstaltung.erstellt")];
        let refs: Vec<&DomainEvent> = events.iter().collect();
        let state = projection.fold(Some(Bson::from(bson::doc! { "count": 1 })), &refs);
        assert_eq!(state, Bson::from(bson::doc! { "count": 2 }));
    }

    #[test]
    fn fold_skips_events_outside_can_handle() {
        let projection = counting_projection();
        let events = vec![event("veranstaltung.geloescht")];
        let refs: Vec<&DomainEvent> = events.iter().collect();
        let state = projection.fold(None, &refs);
        assert_eq!(state, Bson::from(bson::doc! { "count": 0 }));
    }
}
