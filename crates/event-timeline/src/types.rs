//! Core types for the event timeline.
//!
//! This module provides:
//! - [`Entry`] — One recorded occurrence with provenance and outcome
//! - [`EntryStatus`] / [`Direction`] — Lifecycle and flow tags
//! - [`Payload`] — Tagged producer payloads
//! - [`FilterSpec`] — Query predicates over entry attributes
//! - [`Cursor`] — Read position plus time-travel flag
//! - [`PortableDocument`] — Export/import format

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TimelineError};

/// Current portable document version.
pub const PORTABLE_VERSION: &str = "1.0";

/// Sequence number assigned to an entry at append time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier joining a request with its eventual outcome.
///
/// Uniqueness is not enforced: retries may reuse an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    /// Creates a correlation id from any string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random correlation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Flow direction of an entry relative to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received by the host application.
    Inbound,
    /// Sent by the host application.
    Outbound,
}

impl Direction {
    /// Returns the string representation of this direction.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Awaiting an outcome.
    Pending,
    /// Completed successfully.
    Success,
    /// Completed with an error.
    Error,
}

impl EntryStatus {
    /// Returns the string representation of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Returns true for `Success` and `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Producer-defined payload.
///
/// The log never inspects payloads; the tag lets producers and consumers
/// evolve their encodings independently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// No payload.
    #[default]
    Empty,
    /// Plain text.
    Text(String),
    /// Structured JSON value.
    Json(serde_json::Value),
    /// Pre-encoded bytes tagged with the producer's schema version.
    Encoded {
        /// Producer schema version.
        schema_version: u32,
        /// Encoded bytes.
        bytes: Vec<u8>,
    },
}

impl Payload {
    /// Returns true if this is [`Payload::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Provenance supplied by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Origin {
    /// Emitting component id.
    pub component: String,
    /// Tab identifier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<String>,
    /// Window identifier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_id: Option<String>,
    /// Session identifier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Source URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Client signature string.
    #[serde(default)]
    pub signature: String,
}

impl Origin {
    /// Creates an origin for the given component.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..Default::default()
        }
    }

    /// Sets the tab id.
    #[must_use]
    pub fn with_tab(mut self, tab_id: impl Into<String>) -> Self {
        self.tab_id = Some(tab_id.into());
        self
    }

    /// Sets the window id.
    #[must_use]
    pub fn with_window(mut self, window_id: impl Into<String>) -> Self {
        self.window_id = Some(window_id.into());
        self
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the source URL.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Sets the client signature.
    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }
}

/// One recorded occurrence.
///
/// Entries are immutable once appended except for the single
/// `Pending -> Success | Error` transition performed by
/// [`Timeline::resolve`](crate::Timeline::resolve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Sequence number.
    pub id: EntryId,
    /// Unix milliseconds at append time.
    pub timestamp: i64,
    /// Semantic type tag.
    pub kind: String,
    /// Request/outcome join key.
    pub correlation_id: CorrelationId,
    /// Flow direction.
    pub direction: Direction,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Producer payload.
    #[serde(default)]
    pub payload: Payload,
    /// Response attached on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Payload>,
    /// Error attached on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Producer provenance.
    #[serde(default)]
    pub origin: Origin,
    /// Unix milliseconds at resolution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl Entry {
    /// Returns true while the entry awaits an outcome.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }

    /// Milliseconds between append and resolution, once resolved.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.resolved_at.map(|at| at - self.timestamp)
    }

    /// Checks if this entry matches the given filter.
    #[must_use]
    pub fn matches(&self, filter: &FilterSpec) -> bool {
        if !filter.kinds.is_empty() && !filter.kinds.contains(&self.kind) {
            return false;
        }
        if !filter.statuses.is_empty() && !filter.statuses.contains(&self.status) {
            return false;
        }
        if !filter.directions.is_empty() && !filter.directions.contains(&self.direction) {
            return false;
        }
        filter.time_range.contains(self.timestamp)
    }

    /// Checks that status and outcome fields agree.
    fn check_consistency(&self) -> std::result::Result<(), String> {
        match self.status {
            EntryStatus::Pending if self.response.is_some() || self.error.is_some() => Err(
                format!("entry {} is pending but carries an outcome", self.id),
            ),
            EntryStatus::Success if self.error.is_some() => {
                Err(format!("entry {} succeeded but carries an error", self.id))
            }
            EntryStatus::Error if self.response.is_some() => {
                Err(format!("entry {} failed but carries a response", self.id))
            }
            _ => Ok(()),
        }
    }
}

/// Outcome reported for a pending entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Success with an optional response.
    Success(Option<Payload>),
    /// Failure with an error message.
    Error(String),
}

impl Outcome {
    /// Returns the status this outcome moves an entry to.
    #[must_use]
    pub const fn status(&self) -> EntryStatus {
        match self {
            Self::Success(_) => EntryStatus::Success,
            Self::Error(_) => EntryStatus::Error,
        }
    }
}

/// Millisecond time range; start inclusive, end exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// End of the range (exclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

impl TimeRange {
    /// Creates a new time range with the given bounds.
    #[must_use]
    pub const fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    /// Creates an open-ended range starting at `start`.
    #[must_use]
    pub const fn since(start: i64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Returns true if neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Checks if a timestamp falls within this range.
    #[must_use]
    pub fn contains(&self, timestamp: i64) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp >= end {
                return false;
            }
        }
        true
    }
}

/// Inclusion predicates over entry attributes.
///
/// An empty predicate set for a dimension places no restriction on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Accepted kinds (empty means all).
    #[serde(default)]
    pub kinds: Vec<String>,
    /// Accepted statuses (empty means all).
    #[serde(default)]
    pub statuses: Vec<EntryStatus>,
    /// Accepted directions (empty means all).
    #[serde(default)]
    pub directions: Vec<Direction>,
    /// Timestamp range.
    #[serde(default)]
    pub time_range: TimeRange,
}

impl FilterSpec {
    /// Creates a new empty filter that matches all entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a kind.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    /// Adds a status.
    #[must_use]
    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.statuses.push(status);
        self
    }

    /// Adds a direction.
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.directions.push(direction);
        self
    }

    /// Sets the time range.
    #[must_use]
    pub const fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    /// Returns true if no dimension is restricted.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.kinds.is_empty()
            && self.statuses.is_empty()
            && self.directions.is_empty()
            && self.time_range.is_unbounded()
    }

    /// Order- and duplicate-insensitive serialization used as a cache key.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        let kinds: BTreeSet<&str> = self.kinds.iter().map(String::as_str).collect();
        let statuses: BTreeSet<&str> = self.statuses.iter().map(EntryStatus::as_str).collect();
        let directions: BTreeSet<&str> = self.directions.iter().map(Direction::as_str).collect();
        serde_json::json!({
            "kinds": kinds,
            "statuses": statuses,
            "directions": directions,
            "start": self.time_range.start,
            "end": self.time_range.end,
        })
        .to_string()
    }
}

/// Read position plus time-travel flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Current position; `None` when the log is empty.
    pub current_index: Option<usize>,
    /// Whether the cursor is frozen on a historical position.
    pub is_time_traveling: bool,
}

impl Cursor {
    /// Cursor tracking the tail of a log with `len` entries.
    #[must_use]
    pub const fn live(len: usize) -> Self {
        Self {
            current_index: len.checked_sub(1),
            is_time_traveling: false,
        }
    }

    /// Current position as a signed integer, `-1` when empty.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_signed(&self) -> i64 {
        self.current_index.map_or(-1, |i| i as i64)
    }
}

/// Portable export/import document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableDocument {
    /// Format version.
    pub version: String,
    /// When the document was produced.
    pub exported_at: DateTime<Utc>,
    /// Full ordered entry sequence.
    pub entries: Vec<Entry>,
}

impl PortableDocument {
    /// Creates a document at the current version.
    #[must_use]
    pub fn new(entries: Vec<Entry>, exported_at: DateTime<Utc>) -> Self {
        Self {
            version: PORTABLE_VERSION.to_string(),
            exported_at,
            entries,
        }
    }

    /// Serializes to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a document.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::MalformedImport`] if the text is not a
    /// well-formed document.
    pub fn from_json(text: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(text)
            .map_err(|e| TimelineError::MalformedImport(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Checks version compatibility and entry consistency.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::MalformedImport`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != "1" {
            return Err(TimelineError::MalformedImport(format!(
                "unsupported version '{}'",
                self.version
            )));
        }

        let mut last_id: Option<EntryId> = None;
        for entry in &self.entries {
            if last_id.is_some_and(|prev| entry.id <= prev) {
                return Err(TimelineError::MalformedImport(format!(
                    "entry {} is out of order",
                    entry.id
                )));
            }
            entry
                .check_consistency()
                .map_err(TimelineError::MalformedImport)?;
            last_id = Some(entry.id);
        }
        Ok(())
    }
}
