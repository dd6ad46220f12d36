//! Subject grammar, event envelope and error taxonomy shared by every
//! Vorfall crate.

pub mod error;
pub mod event;
pub mod subject;

pub use error::{VorfallError, VorfallResult};
pub use event::{
    create_domain_event, events_have_same_stream_subject, group_events_by_stream_subject,
    DomainEvent, NewDomainEvent, DATACONTENTTYPE, EVENT_SOURCE_DEFAULT, SPECVERSION,
};
pub use subject::{collection_of, parse_stream_subject, parse_subject, stream_subject_of, Subject, StreamSubject};
