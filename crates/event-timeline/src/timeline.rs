//! Event log with time-travel navigation.
//!
//! This module provides:
//! - [`Timeline`] — The append-only history plus a movable cursor
//! - [`TimelineSummary`] / [`TimelineStats`] — Diagnostics snapshots
//!
//! All writes go through [`Timeline::append`] and [`Timeline::resolve`].
//! While the cursor is time-traveling, new appends leave it where it is.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::cache::{BoundedCache, CacheStats};
use crate::clock::{SharedClock, SystemClock};
use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::index::{FilterIndex, Snapshot};
use crate::metrics::{MetricChannel, MetricsRecorder, WindowStats};
use crate::pager::Pager;
use crate::persist::SharedStore;
use crate::subscribe::{Subscribers, Subscription, TimelineEvent};
use crate::types::{
    CorrelationId, Cursor, Direction, Entry, EntryId, EntryStatus, FilterSpec, Origin, Outcome,
    Payload, PortableDocument,
};
use crate::worker::Worker;

/// Counts by status and kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimelineSummary {
    /// Number of entries.
    pub total: usize,
    /// Entries awaiting an outcome.
    pub pending: usize,
    /// Entries resolved successfully.
    pub success: usize,
    /// Entries resolved with an error.
    pub error: usize,
    /// Entries per kind.
    pub by_kind: BTreeMap<String, usize>,
}

/// Diagnostics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineStats {
    /// Number of entries.
    pub entries: usize,
    /// Current cursor.
    pub cursor: Cursor,
    /// Whether persisted state has been applied.
    pub ready: bool,
    /// Correlation id cache statistics.
    pub entry_cache: CacheStats,
    /// Query result cache statistics.
    pub query_cache: CacheStats,
    /// Registered subscribers.
    pub subscribers: usize,
    /// Subscriber callbacks that panicked.
    pub subscriber_failures: u64,
    /// Rolling metrics per channel.
    pub metrics: Vec<(MetricChannel, WindowStats)>,
}

struct LogState {
    entries: Vec<Arc<Entry>>,
    cursor: Cursor,
    next_id: u64,
    /// Bumped on every change to `entries`.
    generation: u64,
    ready: bool,
}

impl LogState {
    fn snapshot(&self) -> Snapshot {
        Arc::from(self.entries.as_slice())
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// State shared between a [`Timeline`] and its background worker.
pub(crate) struct Core {
    config: TimelineConfig,
    clock: SharedClock,
    state: RwLock<LogState>,
    /// Serializes mutations together with their notifications.
    writer: ReentrantMutex<()>,
    entry_cache: BoundedCache<CorrelationId, Arc<Entry>>,
    query_cache: BoundedCache<String, Snapshot>,
    index: Mutex<Option<Arc<FilterIndex>>>,
    metrics: MetricsRecorder,
    subscribers: Arc<Subscribers>,
    persist_signal: Notify,
    /// Held while a document is built and written, so writes land in order.
    persist_lock: tokio::sync::Mutex<()>,
    /// Set when loading was cancelled; the stored history must not be replaced.
    history_unrestored: AtomicBool,
}

impl Core {
    fn new(config: TimelineConfig, clock: SharedClock, ready: bool) -> Self {
        Self {
            entry_cache: BoundedCache::with_clock("entries", config.entry_cache, Arc::clone(&clock)),
            query_cache: BoundedCache::with_clock("queries", config.query_cache, Arc::clone(&clock)),
            metrics: MetricsRecorder::new(config.metrics_window),
            config,
            clock,
            state: RwLock::new(LogState {
                entries: Vec::new(),
                cursor: Cursor::default(),
                next_id: 1,
                generation: 0,
                ready,
            }),
            writer: ReentrantMutex::new(()),
            index: Mutex::new(None),
            subscribers: Arc::new(Subscribers::default()),
            persist_signal: Notify::new(),
            persist_lock: tokio::sync::Mutex::new(()),
            history_unrestored: AtomicBool::new(false),
        }
    }

    pub(crate) const fn config(&self) -> &TimelineConfig {
        &self.config
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.read().ready {
            Ok(())
        } else {
            Err(TimelineError::NotInitialized)
        }
    }

    fn request_persist(&self) {
        self.persist_signal.notify_one();
    }

    /// Resolves once a mutation has asked for a durable write.
    pub(crate) async fn persist_requested(&self) {
        self.persist_signal.notified().await;
    }

    fn invalidate_all(&self) {
        self.entry_cache.clear();
        self.query_cache.clear();
        *self.index.lock() = None;
    }

    /// Drops expired cache entries and samples process memory.
    pub(crate) fn sweep_caches(&self) -> usize {
        self.metrics.record_memory_sample();
        let removed = self.entry_cache.sweep_expired() + self.query_cache.sweep_expired();
        if removed > 0 {
            debug!(removed, "cache sweep");
        }
        removed
    }

    /// Index for the current log generation, rebuilt only after changes.
    fn current_index(&self) -> Arc<FilterIndex> {
        let mut cached = self.index.lock();
        let state = self.state.read();
        if let Some(index) = cached.as_ref() {
            if index.generation() == state.generation {
                return Arc::clone(index);
            }
        }
        let index = Arc::new(FilterIndex::build(state.snapshot(), state.generation));
        drop(state);
        *cached = Some(Arc::clone(&index));
        index
    }

    fn persist_document(&self) -> PortableDocument {
        let state = self.state.read();
        let start = state.entries.len().saturating_sub(self.config.persist_window);
        let entries = state.entries.iter().skip(start).map(|e| (**e).clone()).collect();
        drop(state);
        PortableDocument::new(entries, chrono::Utc::now())
    }

    /// Writes the most recent window of entries to `store`.
    pub(crate) async fn persist_to(&self, store: &SharedStore) -> Result<()> {
        let _ordered = self.persist_lock.lock().await;
        if !self.state.read().ready {
            // Stored history has not been applied yet.
            debug!("skipping persist while loading");
            return Ok(());
        }
        if self.history_unrestored.load(Ordering::Acquire) {
            return Err(TimelineError::Persistence(
                "stored history was never restored; refusing to overwrite it".to_string(),
            ));
        }
        let doc = self.persist_document();
        let count = doc.entries.len();
        let bytes = serde_json::to_vec(&doc)?;
        let key = self.config.storage_key.clone();
        let store = Arc::clone(store);

        let write = tokio::task::spawn_blocking(move || store.write(&key, &bytes));
        let result = self
            .metrics
            .time_execution_async(MetricChannel::Persistence, write)
            .await
            .map_err(|e| TimelineError::Persistence(format!("write task failed: {e}")))
            .and_then(|r| r);

        match &result {
            Ok(()) => debug!(entries = count, "persisted timeline"),
            Err(e) => warn!(error = %e, "failed to persist timeline"),
        }
        result
    }

    /// Reads persisted history and marks the timeline ready.
    ///
    /// Unreadable or malformed history is logged and skipped.
    pub(crate) async fn load_from(&self, store: &SharedStore) {
        let key = self.config.storage_key.clone();
        let reader = Arc::clone(store);
        let read = tokio::task::spawn_blocking(move || reader.read(&key));
        let result = self
            .metrics
            .time_execution_async(MetricChannel::Persistence, read)
            .await
            .map_err(|e| TimelineError::Persistence(format!("read task failed: {e}")))
            .and_then(|r| r);

        let restored = match result {
            Ok(Some(bytes)) => match serde_json::from_slice::<PortableDocument>(&bytes)
                .map_err(|e| TimelineError::MalformedImport(e.to_string()))
                .and_then(|doc| doc.validate().map(|()| doc))
            {
                Ok(doc) => doc.entries,
                Err(e) => {
                    warn!(error = %e, "ignoring malformed persisted history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read persisted history");
                Vec::new()
            }
        };

        let _writer = self.writer.lock();
        if self.history_unrestored.load(Ordering::Acquire) {
            debug!("restore finished after being cancelled; discarding it");
            return;
        }
        self.seed(restored);
    }

    /// Marks the timeline ready without restoring stored history.
    ///
    /// Entries appended while loading are kept in memory. The stored history
    /// is left untouched and later writes to it are refused.
    pub(crate) fn abandon_load(&self) {
        let _writer = self.writer.lock();
        if self.state.read().ready {
            return;
        }
        self.history_unrestored.store(true, Ordering::Release);
        warn!("history restore cancelled; timeline continues in memory only");
        self.seed(Vec::new());
    }

    /// Places restored history before anything appended while loading.
    fn seed(&self, restored: Vec<Entry>) {
        let _writer = self.writer.lock();
        let restored_count = restored.len();
        let count = {
            let mut state = self.state.write();
            let live = std::mem::take(&mut state.entries);
            state.next_id = restored.last().map_or(1, |e| e.id.0 + 1);
            state.entries = restored.into_iter().map(Arc::new).collect();

            for entry in live {
                let mut entry = (*entry).clone();
                entry.id = state.allocate_id();
                state.entries.push(Arc::new(entry));
            }

            state.cursor = Cursor::live(state.entries.len());
            state.generation += 1;
            state.ready = true;
            state.entries.len()
        };

        self.invalidate_all();
        info!(restored = restored_count, total = count, "timeline ready");
        if count > restored_count {
            self.request_persist();
        }
        self.subscribers.dispatch(&TimelineEvent::Imported { count });
    }
}

/// Ordered, replayable event history with a time-travel cursor.
///
/// Each instance exclusively owns its log, cursor and caches. Construct one
/// per session and hand references to producers and consumers.
pub struct Timeline {
    core: Arc<Core>,
    store: Option<SharedStore>,
    worker: Mutex<Option<Worker>>,
}

impl Timeline {
    /// Creates an in-memory timeline with no durable store.
    ///
    /// Expired cache entries are dropped on access and by
    /// [`Timeline::sweep_expired`]; there is no background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: TimelineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an in-memory timeline reading time from `clock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_clock(config: TimelineConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(Core::new(config, clock, true)),
            store: None,
            worker: Mutex::new(None),
        })
    }

    /// Opens a timeline backed by `store`, restoring persisted history first.
    ///
    /// Unreadable history is logged and the timeline starts empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn open(config: TimelineConfig, store: SharedStore) -> Result<Self> {
        Self::open_with_clock(config, store, Arc::new(SystemClock)).await
    }

    /// Like [`Timeline::open`] with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn open_with_clock(
        config: TimelineConfig,
        store: SharedStore,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;
        let core = Arc::new(Core::new(config, clock, false));
        core.load_from(&store).await;
        let worker = Worker::spawn(Arc::clone(&core), Arc::clone(&store), false);
        Ok(Self {
            core,
            store: Some(store),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Creates a timeline backed by `store` and restores history in the background.
    ///
    /// Until [`Timeline::is_ready`] returns true, time travel, queries,
    /// export and import fail with [`TimelineError::NotInitialized`].
    /// Appends and resolves are accepted and end up after the restored history.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no tokio runtime
    /// is available.
    pub fn spawn(config: TimelineConfig, store: SharedStore) -> Result<Self> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TimelineError::Config(
                "Timeline::spawn requires a tokio runtime".to_string(),
            ));
        }
        let core = Arc::new(Core::new(config, Arc::new(SystemClock), false));
        let worker = Worker::spawn(Arc::clone(&core), Arc::clone(&store), true);
        Ok(Self {
            core,
            store: Some(store),
            worker: Mutex::new(Some(worker)),
        })
    }

    // ========== Mutations ==========

    /// Records a new pending entry at the tail.
    ///
    /// The cursor follows the tail unless it is time-traveling.
    pub fn append(
        &self,
        kind: impl Into<String>,
        payload: Payload,
        correlation_id: impl Into<CorrelationId>,
        direction: Direction,
        origin: Origin,
    ) -> Arc<Entry> {
        let _writer = self.core.writer.lock();
        let started = Instant::now();

        let (index, entry) = {
            let mut state = self.core.state.write();
            let entry = Arc::new(Entry {
                id: state.allocate_id(),
                timestamp: self.core.clock.now_millis(),
                kind: kind.into(),
                correlation_id: correlation_id.into(),
                direction,
                status: EntryStatus::Pending,
                payload,
                response: None,
                error: None,
                origin,
                resolved_at: None,
            });
            state.entries.push(Arc::clone(&entry));
            state.generation += 1;
            if !state.cursor.is_time_traveling {
                state.cursor = Cursor::live(state.entries.len());
            }
            (state.entries.len() - 1, entry)
        };

        self.core.query_cache.clear();
        self.core.entry_cache.remove(&entry.correlation_id);
        self.core.metrics.record(
            MetricChannel::MessageProcessing,
            started.elapsed().as_secs_f64() * 1_000.0,
        );
        debug!(id = %entry.id, kind = %entry.kind, correlation = %entry.correlation_id, "appended entry");

        self.core.request_persist();
        self.core.subscribers.dispatch(&TimelineEvent::Appended {
            index,
            entry: Arc::clone(&entry),
        });
        entry
    }

    /// Attaches an outcome to the most recent pending entry with `correlation_id`.
    ///
    /// Returns the resolved entry, or `None` if no pending entry carries the
    /// id. Late or duplicate outcomes are therefore ignored.
    pub fn resolve(&self, correlation_id: &CorrelationId, outcome: Outcome) -> Option<Arc<Entry>> {
        let _writer = self.core.writer.lock();
        let started = Instant::now();

        let resolved = {
            let mut state = self.core.state.write();
            let now = self.core.clock.now_millis();
            let position = state
                .entries
                .iter()
                .rposition(|e| &e.correlation_id == correlation_id && e.is_pending());
            position.map(|index| {
                let mut entry = (*state.entries[index]).clone();
                entry.status = outcome.status();
                match outcome {
                    Outcome::Success(response) => entry.response = response,
                    Outcome::Error(message) => entry.error = Some(message),
                }
                entry.resolved_at = Some(now);
                let entry = Arc::new(entry);
                state.entries[index] = Arc::clone(&entry);
                state.generation += 1;
                (index, entry)
            })
        };

        let Some((index, entry)) = resolved else {
            debug!(correlation = %correlation_id, "no pending entry to resolve");
            return None;
        };

        self.core.query_cache.clear();
        self.core.entry_cache.remove(correlation_id);
        self.core.metrics.record(
            MetricChannel::MessageProcessing,
            started.elapsed().as_secs_f64() * 1_000.0,
        );
        debug!(id = %entry.id, status = entry.status.as_str(), "resolved entry");

        self.core.request_persist();
        self.core.subscribers.dispatch(&TimelineEvent::Resolved {
            index,
            entry: Arc::clone(&entry),
        });
        Some(entry)
    }

    /// Empties the log and returns the cursor to its initial state.
    pub fn clear(&self) {
        let _writer = self.core.writer.lock();
        {
            let mut state = self.core.state.write();
            state.entries.clear();
            state.cursor = Cursor::default();
            state.generation += 1;
        }
        self.core.invalidate_all();
        info!("timeline cleared");

        self.core.request_persist();
        self.core.subscribers.dispatch(&TimelineEvent::Cleared);
    }

    // ========== Time travel ==========

    /// Freezes the cursor at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::OutOfRange`] if `index` is not a valid
    /// position, or [`TimelineError::NotInitialized`] while loading.
    pub fn time_travel_to(&self, index: usize) -> Result<Cursor> {
        let _writer = self.core.writer.lock();
        self.core.ensure_ready()?;

        let cursor = {
            let mut state = self.core.state.write();
            let len = state.entries.len();
            if index >= len {
                return Err(TimelineError::OutOfRange { index, len });
            }
            state.cursor = Cursor {
                current_index: Some(index),
                is_time_traveling: true,
            };
            state.cursor
        };

        debug!(index, "time travel");
        self.core.subscribers.dispatch(&TimelineEvent::CursorMoved(cursor));
        Ok(cursor)
    }

    /// Moves the cursor one entry back. No-op at the first entry or when empty.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NotInitialized`] while loading.
    pub fn step_back(&self) -> Result<Cursor> {
        let _writer = self.core.writer.lock();
        self.core.ensure_ready()?;
        match self.cursor().current_index {
            Some(current) if current > 0 => self.time_travel_to(current - 1),
            _ => Ok(self.cursor()),
        }
    }

    /// Moves the cursor one entry forward. No-op at the last entry.
    ///
    /// Reaching the tail does not end time travel; use
    /// [`Timeline::reset_to_present`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NotInitialized`] while loading.
    pub fn step_forward(&self) -> Result<Cursor> {
        let _writer = self.core.writer.lock();
        self.core.ensure_ready()?;
        let len = self.len();
        match self.cursor().current_index {
            Some(current) if current + 1 < len => self.time_travel_to(current + 1),
            _ => Ok(self.cursor()),
        }
    }

    /// Returns the cursor to the live tail.
    pub fn reset_to_present(&self) -> Cursor {
        let _writer = self.core.writer.lock();
        let cursor = {
            let mut state = self.core.state.write();
            state.cursor = Cursor::live(state.entries.len());
            state.cursor
        };
        debug!("returned to present");
        self.core.subscribers.dispatch(&TimelineEvent::CursorMoved(cursor));
        cursor
    }

    // ========== Reads ==========

    /// Current cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.core.state.read().cursor
    }

    /// Entry under the cursor.
    #[must_use]
    pub fn current_entry(&self) -> Option<Arc<Entry>> {
        let state = self.core.state.read();
        state
            .cursor
            .current_index
            .and_then(|i| state.entries.get(i).cloned())
    }

    /// Entries up to and including the cursor: the log as it looked then.
    #[must_use]
    pub fn visible_entries(&self) -> Vec<Arc<Entry>> {
        let state = self.core.state.read();
        state
            .cursor
            .current_index
            .map_or_else(Vec::new, |i| state.entries[..=i].to_vec())
    }

    /// The full ordered log.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.core.state.read().snapshot()
    }

    /// Entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<Arc<Entry>> {
        self.core.state.read().entries.get(index).cloned()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.state.read().entries.len()
    }

    /// Returns true if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.state.read().entries.is_empty()
    }

    /// Returns true once persisted history has been applied.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.core.state.read().ready
    }

    /// Most recent entry with `correlation_id`.
    pub fn get_by_correlation(&self, correlation_id: &CorrelationId) -> Option<Arc<Entry>> {
        if let Some(entry) = self.core.entry_cache.get(correlation_id) {
            return Some(entry);
        }

        let _writer = self.core.writer.lock();
        let found = self
            .core
            .state
            .read()
            .entries
            .iter()
            .rev()
            .find(|e| &e.correlation_id == correlation_id)
            .cloned()?;
        self.core
            .entry_cache
            .put(correlation_id.clone(), Arc::clone(&found));
        Some(found)
    }

    /// Entries matching `filter`, paged by `page_size`.
    ///
    /// Results for identical filters are served from the query cache until
    /// the log changes.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NotInitialized`] while loading.
    pub fn query(&self, filter: &FilterSpec, page_size: usize) -> Result<Pager<Arc<Entry>>> {
        self.core.ensure_ready()?;
        let key = filter.canonical_key();

        let results = self.core.metrics.time_execution(MetricChannel::Render, || {
            if let Some(hit) = self.core.query_cache.get(&key) {
                return hit;
            }
            let _writer = self.core.writer.lock();
            let matched: Snapshot = self.core.current_index().filter(filter).into();
            self.core.query_cache.put(key, Arc::clone(&matched));
            matched
        });

        Ok(Pager::new(results, page_size))
    }

    /// Page `page` of the entries matching `filter`, using the configured page size.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NotInitialized`] while loading.
    pub fn query_page(&self, filter: &FilterSpec, page: usize) -> Result<Vec<Arc<Entry>>> {
        let pager = self.query(filter, self.core.config.default_page_size)?;
        Ok(pager.load_page(page).to_vec())
    }

    /// Counts by status and kind.
    #[must_use]
    pub fn summary(&self) -> TimelineSummary {
        let state = self.core.state.read();
        let mut summary = TimelineSummary {
            total: state.entries.len(),
            ..TimelineSummary::default()
        };
        for entry in &state.entries {
            match entry.status {
                EntryStatus::Pending => summary.pending += 1,
                EntryStatus::Success => summary.success += 1,
                EntryStatus::Error => summary.error += 1,
            }
            *summary.by_kind.entry(entry.kind.clone()).or_default() += 1;
        }
        summary
    }

    /// Diagnostics snapshot.
    #[must_use]
    pub fn stats(&self) -> TimelineStats {
        let (entries, cursor, ready) = {
            let state = self.core.state.read();
            (state.entries.len(), state.cursor, state.ready)
        };
        TimelineStats {
            entries,
            cursor,
            ready,
            entry_cache: self.core.entry_cache.stats(),
            query_cache: self.core.query_cache.stats(),
            subscribers: self.core.subscribers.len(),
            subscriber_failures: self.core.subscribers.failures(),
            metrics: self.core.metrics.all_stats(),
        }
    }

    /// Rolling performance samples.
    #[must_use]
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.core.metrics
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &TimelineConfig {
        &self.core.config
    }

    /// Drops expired cache entries now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.core.sweep_caches()
    }

    // ========== Subscriptions ==========

    /// Registers `callback` for every accepted change.
    ///
    /// Callbacks run synchronously on the mutating thread, in acceptance
    /// order, after the change is visible. They should return quickly.
    pub fn subscribe(
        &self,
        callback: impl Fn(&TimelineEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.subscribers.register(callback)
    }

    // ========== Export / import ==========

    /// Full log as a portable document.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::NotInitialized`] while loading.
    pub fn export(&self) -> Result<PortableDocument> {
        self.core.ensure_ready()?;
        let entries = self
            .core
            .state
            .read()
            .entries
            .iter()
            .map(|e| (**e).clone())
            .collect();
        Ok(PortableDocument::new(entries, chrono::Utc::now()))
    }

    /// Full log as portable JSON.
    ///
    /// # Errors
    ///
    /// Returns an error while loading or if serialization fails.
    pub fn export_json(&self) -> Result<String> {
        self.export()?.to_json()
    }

    /// Replaces the log with the document's entries.
    ///
    /// The document is validated first; a rejected document leaves the log
    /// untouched. The cursor returns to the live tail.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::MalformedImport`] for invalid documents or
    /// [`TimelineError::NotInitialized`] while loading.
    pub fn import(&self, doc: PortableDocument) -> Result<()> {
        let _writer = self.core.writer.lock();
        self.core.ensure_ready()?;
        if let Err(e) = doc.validate() {
            warn!(error = %e, "rejected import");
            return Err(e);
        }

        let count = {
            let mut state = self.core.state.write();
            let after_last = doc.entries.last().map_or(1, |e| e.id.0 + 1);
            state.next_id = state.next_id.max(after_last);
            state.entries = doc.entries.into_iter().map(Arc::new).collect();
            state.cursor = Cursor::live(state.entries.len());
            state.generation += 1;
            state.entries.len()
        };
        self.core.invalidate_all();
        info!(count, "imported timeline");

        self.core.request_persist();
        self.core.subscribers.dispatch(&TimelineEvent::Imported { count });
        Ok(())
    }

    /// Parses portable JSON and imports it.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::MalformedImport`] if the text is not a valid
    /// document, or [`TimelineError::NotInitialized`] while loading.
    pub fn import_json(&self, text: &str) -> Result<()> {
        self.core.ensure_ready()?;
        let doc = PortableDocument::from_json(text).inspect_err(|e| {
            warn!(error = %e, "rejected import");
        })?;
        self.import(doc)
    }

    // ========== Lifecycle ==========

    /// Writes the current window to the durable store now.
    ///
    /// Unlike background writes, the result is reported to the caller.
    /// A timeline without a store flushes trivially.
    ///
    /// # Errors
    ///
    /// Returns [`TimelineError::Persistence`] if the write fails, or
    /// [`TimelineError::NotInitialized`] while loading.
    pub async fn flush(&self) -> Result<()> {
        self.core.ensure_ready()?;
        match &self.store {
            Some(store) => self.core.persist_to(store).await,
            None => Ok(()),
        }
    }

    /// Stops the background sweep and persistence task.
    ///
    /// Idempotent. The in-memory log stays usable but is no longer persisted.
    /// If stored history was still loading, the timeline becomes ready
    /// without it and [`Timeline::flush`] refuses to overwrite the stored copy.
    pub fn destroy(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.cancel();
            self.core.abandon_load();
            info!("timeline destroyed");
        }
    }

    /// Flushes, then stops the background task and waits for it to exit.
    pub async fn shutdown(&self) {
        if self.is_ready() {
            // Failures are already logged by the persistence path.
            let _ = self.flush().await;
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.stop().await;
            info!("timeline shut down");
        }
    }

    /// Returns true while the background task is running.
    #[must_use]
    pub fn has_worker(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Drop for Timeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.read();
        f.debug_struct("Timeline")
            .field("entries", &state.entries.len())
            .field("cursor", &state.cursor)
            .field("ready", &state.ready)
            .field("persistent", &self.store.is_some())
            .finish_non_exhaustive()
    }
}
