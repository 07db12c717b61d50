//! # event-timeline
//!
//! Ordered, replayable history of request/response events with time-travel
//! navigation.
//!
//! This crate provides:
//!
//! - [`Timeline`] — Append-only log with a movable cursor, queries and export
//! - [`Entry`] — One recorded event and its eventual outcome
//! - [`FilterSpec`] — Multi-dimensional query filters
//! - [`FilterIndex`] — Per-kind, per-status and per-direction position index
//! - [`Pager`] — Fixed-size pages over query results
//! - [`BoundedCache`] — LRU cache with time-based expiry
//! - [`MetricsRecorder`] — Rolling min/max/avg per metrics channel
//! - [`DurableStore`] — Abstract trait for persistence backends
//! - [`PortableDocument`] — Versioned JSON export format
//!
//! ## Example
//!
//! ```rust
//! use event_timeline::{
//!     Direction, EntryStatus, FilterSpec, Origin, Outcome, Payload, Timeline, TimelineConfig,
//! };
//!
//! let timeline = Timeline::new(TimelineConfig::default())?;
//!
//! for id in ["a", "b", "c"] {
//!     timeline.append("ping", Payload::Empty, id, Direction::Outbound, Origin::new("panel"));
//! }
//! timeline.resolve(&"b".into(), Outcome::Success(None));
//!
//! let pending = timeline.query(&FilterSpec::new().with_status(EntryStatus::Pending), 10)?;
//! assert_eq!(pending.total_count(), 2);
//!
//! // Freeze the view at the first entry, then step forward.
//! timeline.time_travel_to(0)?;
//! let cursor = timeline.step_forward()?;
//! assert_eq!(cursor.current_index, Some(1));
//! assert!(cursor.is_time_traveling);
//! # Ok::<(), event_timeline::TimelineError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod index;
pub mod metrics;
pub mod pager;
pub mod persist;
pub mod subscribe;
pub mod timeline;
pub mod types;
mod worker;

// Re-export main types
pub use cache::{BoundedCache, CacheConfig, CacheEntry, CacheStats};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::TimelineConfig;
pub use error::{Result, TimelineError};
pub use index::{FilterIndex, Snapshot};
pub use metrics::{MetricChannel, MetricsRecorder, WindowStats};
pub use pager::Pager;
pub use persist::{DurableStore, FileStore, MemoryStore, SharedStore};
pub use subscribe::{Subscription, TimelineEvent};
pub use timeline::{Timeline, TimelineStats, TimelineSummary};
pub use types::{
    CorrelationId, Cursor, Direction, Entry, EntryId, EntryStatus, FilterSpec, Origin, Outcome,
    Payload, PortableDocument, TimeRange, PORTABLE_VERSION,
};
