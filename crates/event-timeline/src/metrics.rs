//! Rolling-window performance samples.
//!
//! The [`MetricsRecorder`] keeps a fixed number of recent samples per
//! [`MetricChannel`] and summarizes them on demand. Samples only feed
//! diagnostics; recording never fails.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default number of samples retained per channel.
pub const DEFAULT_WINDOW: usize = 100;

/// Named sample channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricChannel {
    /// Time spent accepting a log mutation (milliseconds).
    MessageProcessing,
    /// Time spent writing to or reading from the durable store (milliseconds).
    Persistence,
    /// Time spent producing a view for a consumer (milliseconds).
    Render,
    /// Resident memory samples (bytes).
    Memory,
}

impl MetricChannel {
    /// All channels in declaration order.
    pub const ALL: [Self; 4] = [
        Self::MessageProcessing,
        Self::Persistence,
        Self::Render,
        Self::Memory,
    ];

    /// Returns the string representation of this channel.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MessageProcessing => "message_processing",
            Self::Persistence => "persistence",
            Self::Render => "render",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for MetricChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a channel's current window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub avg: f64,
    /// Number of samples in the window.
    pub count: usize,
}

/// Thread-safe per-channel rolling windows.
#[derive(Debug)]
pub struct MetricsRecorder {
    window: usize,
    samples: RwLock<HashMap<MetricChannel, VecDeque<f64>>>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl MetricsRecorder {
    /// Creates a recorder keeping `window` samples per channel (at least one).
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the window size.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Appends a sample, dropping the oldest once the window is full.
    pub fn record(&self, channel: MetricChannel, value: f64) {
        let mut samples = self.samples.write();
        let window = samples
            .entry(channel)
            .or_insert_with(|| VecDeque::with_capacity(self.window));
        if window.len() == self.window {
            window.pop_front();
        }
        window.push_back(value);
        trace!(%channel, value, "recorded sample");
    }

    /// Summarizes the current window, or `None` if the channel has no samples.
    #[must_use]
    pub fn stats(&self, channel: MetricChannel) -> Option<WindowStats> {
        let samples = self.samples.read();
        let window = samples.get(&channel)?;
        if window.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &value in window {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }

        Some(WindowStats {
            min,
            max,
            avg: sum / window.len() as f64,
            count: window.len(),
        })
    }

    /// Channels that currently hold samples, in declaration order.
    #[must_use]
    pub fn channels(&self) -> Vec<MetricChannel> {
        let samples = self.samples.read();
        MetricChannel::ALL
            .iter()
            .copied()
            .filter(|channel| samples.get(channel).is_some_and(|w| !w.is_empty()))
            .collect()
    }

    /// Summaries for every channel that has samples.
    #[must_use]
    pub fn all_stats(&self) -> Vec<(MetricChannel, WindowStats)> {
        MetricChannel::ALL
            .iter()
            .filter_map(|&channel| self.stats(channel).map(|s| (channel, s)))
            .collect()
    }

    /// Runs `f` and records its wall-clock duration in milliseconds.
    ///
    /// The result of `f` is returned untouched, including errors.
    pub fn time_execution<T>(&self, channel: MetricChannel, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.record(channel, started.elapsed().as_secs_f64() * 1_000.0);
        result
    }

    /// Awaits `fut` and records its wall-clock duration in milliseconds.
    pub async fn time_execution_async<F>(&self, channel: MetricChannel, fut: F) -> F::Output
    where
        F: Future,
    {
        let started = Instant::now();
        let result = fut.await;
        self.record(channel, started.elapsed().as_secs_f64() * 1_000.0);
        result
    }

    /// Records the process resident set size, when the platform exposes it.
    ///
    /// Returns the sampled byte count.
    pub fn record_memory_sample(&self) -> Option<u64> {
        let bytes = resident_memory_bytes()?;
        #[allow(clippy::cast_precision_loss)]
        let value = bytes as f64;
        self.record(MetricChannel::Memory, value);
        Some(bytes)
    }

    /// Drops all samples.
    pub fn clear(&self) {
        self.samples.write().clear();
    }
}

/// Reads the resident set size from `/proc/self/statm`.
fn resident_memory_bytes() -> Option<u64> {
    const PAGE_SIZE: u64 = 4096;

    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_over_window() {
        let recorder = MetricsRecorder::new(10);
        for value in [4.0, 1.0, 7.0] {
            recorder.record(MetricChannel::Render, value);
        }

        let stats = recorder.stats(MetricChannel::Render);
        assert_eq!(
            stats,
            Some(WindowStats {
                min: 1.0,
                max: 7.0,
                avg: 4.0,
                count: 3,
            })
        );
    }

    #[test]
    fn window_drops_oldest() {
        let recorder = MetricsRecorder::new(3);
        for value in 1..=5 {
            recorder.record(MetricChannel::Persistence, f64::from(value));
        }

        let stats = recorder.stats(MetricChannel::Persistence);
        assert!(stats.is_some());
        if let Some(stats) = stats {
            assert_eq!(stats.count, 3);
            assert!((stats.min - 3.0).abs() < f64::EPSILON);
            assert!((stats.max - 5.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn empty_channel_has_no_stats() {
        let recorder = MetricsRecorder::default();
        assert_eq!(recorder.window(), DEFAULT_WINDOW);
        assert!(recorder.stats(MetricChannel::Memory).is_none());
        assert!(recorder.all_stats().is_empty());
    }

    #[test]
    fn zero_window_clamps_to_one() {
        let recorder = MetricsRecorder::new(0);
        recorder.record(MetricChannel::Render, 1.0);
        recorder.record(MetricChannel::Render, 2.0);
        assert_eq!(recorder.stats(MetricChannel::Render).map(|s| s.count), Some(1));
    }

    #[test]
    fn time_execution_preserves_result() {
        let recorder = MetricsRecorder::default();
        let ok: Result<u32, String> =
            recorder.time_execution(MetricChannel::MessageProcessing, || Ok(7));
        let err: Result<u32, String> =
            recorder.time_execution(MetricChannel::MessageProcessing, || Err("bad".to_string()));

        assert_eq!(ok, Ok(7));
        assert_eq!(err, Err("bad".to_string()));
        assert_eq!(
            recorder.stats(MetricChannel::MessageProcessing).map(|s| s.count),
            Some(2)
        );
    }

    #[tokio::test]
    async fn time_execution_async_records() {
        let recorder = MetricsRecorder::default();
        let value = recorder
            .time_execution_async(MetricChannel::Persistence, async { 11 })
            .await;
        assert_eq!(value, 11);
        assert_eq!(recorder.stats(MetricChannel::Persistence).map(|s| s.count), Some(1));
    }

    #[test]
    fn all_stats_lists_recorded_channels() {
        let recorder = MetricsRecorder::default();
        recorder.record(MetricChannel::Render, 1.0);
        recorder.record(MetricChannel::Memory, 2.0);

        let channels: Vec<MetricChannel> = recorder.all_stats().into_iter().map(|(c, _)| c).collect();
        assert_eq!(channels, vec![MetricChannel::Render, MetricChannel::Memory]);
        assert_eq!(recorder.channels(), channels);

        recorder.clear();
        assert!(recorder.all_stats().is_empty());
    }

    #[test]
    fn channel_display() {
        assert_eq!(MetricChannel::MessageProcessing.to_string(), "message_processing");
    }
}
