//! Error taxonomy shared by every Vorfall crate.

use thiserror::Error;

/// Result type used across the Vorfall workspace.
pub type VorfallResult<T> = Result<T, VorfallError>;

/// The full error taxonomy for Vorfall (subject parsing, envelope
/// construction, append protocol, queries, storage).
///
/// Each variant names the subject/stream/entity involved so a caller can
/// report a precise failure without parsing a driver error string.
#[derive(Debug, Error)]
pub enum VorfallError {
    /// Malformed subject or wrong-arity stream subject.
    #[error("invalid subject format: {subject:?}: {reason}")]
    InvalidSubjectFormat { subject: String, reason: String },

    /// `appendOrCreateStream` (or a precondition guard) was called with no events.
    #[error("empty event batch")]
    EmptyBatch,

    /// A single-stream fast path was asked to operate on events that span
    /// more than one stream subject.
    #[error("mixed-stream batch: events target {subjects:?}")]
    MixedStreamBatch { subjects: Vec<String> },

    /// `findMultipleProjections`/`countProjections` received an entity
    /// containing a `/`.
    #[error("invalid entity {entity:?}: entity names may not contain '/'")]
    InvalidEntity { entity: String },

    /// A command handler's result could not be normalized into a non-empty
    /// sequence of events.
    #[error("command handler returned an invalid result")]
    InvalidHandlerResult,

    /// The database backend failed (connection, transaction abort after
    /// retries, or any other driver-level error). Not recovered locally.
    #[error("storage error: {0}")]
    Storage(String),

    /// `findOneAndUpdate` with `upsert: true` returned no document.
    /// Indicates a precondition or driver bug; treated as fatal.
    #[error("upsert on stream {stream_subject:?} unexpectedly returned no document")]
    UpsertUnexpectedlyMissing { stream_subject: String },
}

impl VorfallError {
    pub fn invalid_subject(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSubjectFormat {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn mixed_stream_batch(subjects: Vec<String>) -> Self {
        Self::MixedStreamBatch { subjects }
    }

    pub fn invalid_entity(entity: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity: entity.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn upsert_unexpectedly_missing(stream_subject: impl Into<String>) -> Self {
        Self::UpsertUnexpectedlyMissing {
            stream_subject: stream_subject.into(),
        }
    }
}
