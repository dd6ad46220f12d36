//! Subject grammar: the hierarchical identifier discipline that drives
//! stream identity and collection layout.
//!
//! A subject is a non-empty string matching `segment('/'segment)*` where
//! `segment = [A-Za-z0-9-]+`. Parsing is a single left-to-right scan over
//! the bytes of `s` (O(|s|), one allocation for the owned string).

use crate::error::{VorfallError, VorfallResult};

/// An opaque, validated subject (one or more `/`-separated segments).
///
/// The only way to construct a `Subject` is [`parse_subject`] — this keeps
/// the grammar checkpoint at every boundary, per the "opaque identity"
/// design note: storage sees a plain string, but construction always goes
/// through the parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject(String);

/// A validated two-segment stream subject (`entity/id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSubject(String);

impl Subject {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl StreamSubject {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for Subject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::fmt::Display for StreamSubject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StreamSubject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Split `s` into segments, rejecting empty segments (covers leading,
/// trailing and consecutive `/`) and characters outside `[A-Za-z0-9-]`.
fn validate_segments(s: &str) -> Result<usize, String> {
    if s.is_empty() {
        return Err("subject must not be empty".to_string());
    }

    let mut segment_count = 0usize;
    for segment in s.split('/') {
        if segment.is_empty() {
            return Err(
                "subject must not contain empty segments (leading/trailing/consecutive '/')"
                    .to_string(),
            );
        }
        if let Some(bad) = segment.chars().find(|c| !is_segment_char(*c)) {
            return Err(format!(
                "segment {segment:?} contains disallowed character {bad:?}"
            ));
        }
        segment_count += 1;
    }
    Ok(segment_count)
}

/// Parse `s` as a subject: at least one segment, in strict mode requiring
/// at least two so that every parsed subject has a well-defined stream
/// subject (see DESIGN.md for why this port does not keep the legacy
/// single-segment leniency).
pub fn parse_subject(s: &str) -> VorfallResult<Subject> {
    let segment_count =
        validate_segments(s).map_err(|reason| VorfallError::invalid_subject(s, reason))?;
    if segment_count < 2 {
        return Err(VorfallError::invalid_subject(
            s,
            "subject must have at least two segments (entity/id[/qualifier...])",
        ));
    }
    Ok(Subject(s.to_string()))
}

/// Parse `s` as a stream subject: exactly two segments, `entity/id`.
pub fn parse_stream_subject(s: &str) -> VorfallResult<StreamSubject> {
    let segment_count =
        validate_segments(s).map_err(|reason| VorfallError::invalid_subject(s, reason))?;
    if segment_count != 2 {
        return Err(VorfallError::invalid_subject(
            s,
            format!("stream subject must have exactly two segments, found {segment_count}"),
        ));
    }
    Ok(StreamSubject(s.to_string()))
}

/// Derive the stream subject (first two segments) from an event subject.
pub fn stream_subject_of(subject: &Subject) -> VorfallResult<StreamSubject> {
    let mut parts = subject.segments();
    let (Some(entity), Some(id)) = (parts.next(), parts.next()) else {
        return Err(VorfallError::invalid_subject(
            subject.as_str(),
            "subject has fewer than two segments",
        ));
    };
    Ok(StreamSubject(format!("{entity}/{id}")))
}

/// The collection name for a subject: its first segment.
pub fn collection_of(subject: &Subject) -> VorfallResult<String> {
    subject
        .segments()
        .next()
        .map(str::to_string)
        .ok_or_else(|| VorfallError::invalid_subject(subject.as_str(), "subject has no segments"))
}
