//! The event envelope: a CloudEvents-1.0 conformant wrapper around a typed
//! payload, plus the grouping/guard helpers the append protocol relies on.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{VorfallError, VorfallResult};
use crate::subject::{self, StreamSubject};

/// Default `source` attribute for events created by this library.
pub const EVENT_SOURCE_DEFAULT: &str = "vorfall.eventsourcing.system";

/// CloudEvents `specversion` this library emits.
pub const SPECVERSION: &str = "1.0";

/// CloudEvents `datacontenttype` this library emits.
pub const DATACONTENTTYPE: &str = "application/json";

/// An immutable domain event, wrapped in a CloudEvents-1.0 envelope.
///
/// Events are append-only and never rewritten. `data` and `metadata` are
/// kept as opaque JSON so unknown fields round-trip verbatim through
/// storage and re-wrapping (see [`create_domain_event`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Event subject: `entity/id[/qualifier...]`.
    pub subject: String,

    pub source: String,

    pub specversion: String,

    pub datacontenttype: String,

    pub date: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Input to [`create_domain_event`]. Every field but `event_type` and
/// `subject` is optional; omitted fields get the library defaults, and
/// supplied fields override them — this is what lets a stored event be
/// read back and rewrapped without losing its `id`/`date`.
#[derive(Debug, Clone, Default)]
pub struct NewDomainEvent {
    pub event_type: String,
    pub subject: String,
    pub data: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub id: Option<Uuid>,
    pub source: Option<String>,
    pub specversion: Option<String>,
    pub datacontenttype: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl NewDomainEvent {
    pub fn new(event_type: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }
}

/// Re-derive a [`NewDomainEvent`] from an existing event, preserving every
/// field. Feeding this back into [`create_domain_event`] is a no-op
/// round-trip — the basis for the re-wrapping guarantee in spec.md §4.2.
impl From<&DomainEvent> for NewDomainEvent {
    fn from(event: &DomainEvent) -> Self {
        Self {
            event_type: event.event_type.clone(),
            subject: event.subject.clone(),
            data: event.data.clone(),
            metadata: event.metadata.clone(),
            id: Some(event.id),
            source: Some(event.source.clone()),
            specversion: Some(event.specversion.clone()),
            datacontenttype: Some(event.datacontenttype.clone()),
            date: Some(event.date),
        }
    }
}

/// Build a [`DomainEvent`], filling in CloudEvents defaults for any field
/// the caller didn't supply.
pub fn create_domain_event(input: NewDomainEvent) -> DomainEvent {
    DomainEvent {
        id: input.id.unwrap_or_else(Uuid::new_v4),
        event_type: input.event_type,
        subject: input.subject,
        source: input.source.unwrap_or_else(|| EVENT_SOURCE_DEFAULT.to_string()),
        specversion: input.specversion.unwrap_or_else(|| SPECVERSION.to_string()),
        datacontenttype: input
            .datacontenttype
            .unwrap_or_else(|| DATACONTENTTYPE.to_string()),
        date: input.date.unwrap_or_else(Utc::now),
        data: input.data,
        metadata: input.metadata,
    }
}

/// `true` iff every event in `events` resolves to the same stream subject.
/// Fails with [`VorfallError::EmptyBatch`] on an empty slice — this is the
/// precondition guard single-stream fast paths use before trusting their
/// shortcut.
pub fn events_have_same_stream_subject(events: &[DomainEvent]) -> VorfallResult<bool> {
    let mut iter = events.iter();
    let Some(first) = iter.next() else {
        return Err(VorfallError::EmptyBatch);
    };
    let first_stream = stream_subject_of_event(first)?;
    for event in iter {
        if stream_subject_of_event(event)? != first_stream {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Partition `events` into ordered buckets keyed by stream subject. The map
/// preserves first-appearance order of stream subjects, and caller order is
/// preserved within each bucket — the ordering multi-stream appends depend
/// on.
pub fn group_events_by_stream_subject(
    events: Vec<DomainEvent>,
) -> VorfallResult<IndexMap<StreamSubject, Vec<DomainEvent>>> {
    let mut groups: IndexMap<StreamSubject, Vec<DomainEvent>> = IndexMap::new();
    for event in events {
        let stream = stream_subject_of_event(&event)?;
        groups.entry(stream).or_default().push(event);
    }
    Ok(groups)
}

fn stream_subject_of_event(event: &DomainEvent) -> VorfallResult<StreamSubject> {
    let subject = subject::parse_subject(&event.subject)?;
    subject::stream_subject_of(&subject)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(event_type: &str, subject: &str) -> DomainEvent {
        create_domain_event(NewDomainEvent::new(event_type, subject))
    }

    #[test]
    fn create_domain_event_fills_defaults() {
        let e = sample("veranstaltung.erstellt", "veranstaltung/123/erstellt");
        assert_eq!(e.source, EVENT_SOURCE_DEFAULT);
        assert_eq!(e.specversion, SPECVERSION);
        assert_eq!(e.datacontenttype, DATACONTENTTYPE);
    }

    #[test]
    fn round_trip_preserves_identity_fields() {
        let original = create_domain_event(NewDomainEvent {
            data: Some(serde_json::json!({"test": "data"})),
            metadata: Some(serde_json::json!({"trace": "abc"})),
            ..NewDomainEvent::new("user.created", "user/123/created")
        });

        let rewrapped = create_domain_event(NewDomainEvent::from(&original));

        assert_eq!(rewrapped.id, original.id);
        assert_eq!(rewrapped.date, original.date);
        assert_eq!(rewrapped.event_type, original.event_type);
        assert_eq!(rewrapped.subject, original.subject);
        assert_eq!(rewrapped.data, original.data);
        assert_eq!(rewrapped.metadata, original.metadata);
    }

    #[test]
    fn same_stream_subject_detection() {
        let events = vec![
            sample("user.created", "user/123/created"),
            sample("user.updated", "user/123/updated"),
        ];
        assert!(events_have_same_stream_subject(&events).unwrap());

        let mixed = vec![
            sample("user.created", "user/123/created"),
            sample("user.created", "user/456/created"),
        ];
        assert!(!events_have_same_stream_subject(&mixed).unwrap());
    }

    #[test]
    fn same_stream_subject_rejects_empty_batch() {
        assert!(matches!(
            events_have_same_stream_subject(&[]),
            Err(VorfallError::EmptyBatch)
        ));
    }

    #[test]
    fn grouping_preserves_first_appearance_and_caller_order() {
        let events = vec![
            sample("user.created", "user/123/created"),
            sample("user.created", "user/456/created"),
            sample("user.updated", "user/123/updated"),
        ];

        let groups = group_events_by_stream_subject(events).unwrap();
        let keys: Vec<&str> = groups.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["user/123", "user/456"]);

        let user_123 = subject::parse_stream_subject("user/123").unwrap();
        let bucket = &groups[&user_123];
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket[0].event_type, "user.created");
        assert_eq!(bucket[1].event_type, "user.updated");
    }
}
