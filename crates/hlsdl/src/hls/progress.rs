// Download progress: admission counters, per-segment outcomes and duration rendering.

use std::fmt::Write;
use std::sync::Arc;

/// Result of one segment download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOutcome {
    /// The body was fetched and written to disk.
    Downloaded { bytes: u64 },
    /// A file with the segment's name already existed; nothing was fetched.
    Skipped,
    /// Resolution, network or write failure. Already logged.
    Failed,
}

/// Progress notifications emitted during dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A segment took a download slot. Counters include this segment.
    Admitted {
        completed: usize,
        total: usize,
        accumulated_duration: f64,
        url: String,
    },
    /// A download task released its slot.
    Finished { url: String, outcome: SegmentOutcome },
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync + 'static>;

/// Running admission counters, owned by the dispatch loop.
///
/// Counts advance when a segment is admitted into a download slot, not when
/// its download finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    completed: usize,
    total: usize,
    accumulated_duration: f64,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            accumulated_duration: 0.0,
        }
    }

    /// Record the admission of one segment with the given declared duration.
    ///
    /// Non-finite or negative durations count the segment but add no time.
    pub fn admit(&mut self, duration: f64) {
        debug_assert!(self.completed < self.total, "admitted more segments than total");
        self.completed = (self.completed + 1).min(self.total);
        if duration.is_finite() && duration > 0.0 {
            self.accumulated_duration += duration;
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn accumulated_duration(&self) -> f64 {
        self.accumulated_duration
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Render seconds as `1h2m3.5s`, `4m0s`, `10s` or `500ms`.
///
/// Precision is one millisecond.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }

    let total_ms = (seconds * 1000.0).round() as u64;
    if total_ms < 1000 {
        return format!("{total_ms}ms");
    }

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let rest_ms = total_ms % 60_000;

    let mut out = String::new();
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }

    let whole = rest_ms / 1000;
    let frac = rest_ms % 1000;
    if frac == 0 {
        let _ = write!(out, "{whole}s");
    } else {
        let frac = format!("{frac:03}");
        let _ = write!(out, "{whole}.{}s", frac.trim_end_matches('0'));
    }
    out
}
