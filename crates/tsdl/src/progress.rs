//! Progress reporting for a download session.
//!
//! [`ProgressSnapshot::compute`] is a pure function of elapsed time and
//! completion counts. Snapshots reach callers through a [`ProgressSink`];
//! formatting them for humans is left to the sink.

use std::sync::Arc;
use std::time::Duration;

/// Progress after a batch has been written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    /// 0..=100; only 100 once every segment is written
    pub percent: u8,
    pub elapsed: Duration,
    /// Linear extrapolation of the remaining time; `None` before any progress.
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn compute(elapsed: Duration, completed: usize, total: usize) -> Self {
        let completed = completed.min(total);

        let percent = if total == 0 || completed == total {
            100
        } else {
            let rounded = (completed as f64 / total as f64 * 100.0).round() as u8;
            rounded.min(99)
        };

        let eta = if completed == 0 {
            None
        } else {
            let remaining_ratio = total as f64 / completed as f64 - 1.0;
            Some(elapsed.mul_f64(remaining_ratio))
        };

        Self {
            completed,
            total,
            percent,
            elapsed,
            eta,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Session lifecycle notifications.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Started { total: usize, batches: usize },
    BatchCompleted {
        batch: usize,
        retries: usize,
        progress: ProgressSnapshot,
    },
    Finished { segments: usize, bytes: u64 },
}

pub type ProgressSink = Arc<dyn Fn(DownloadEvent) + Send + Sync>;
