// Batch scheduler: bounded-concurrency retry sweeps over fixed-width batches.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DownloadOptions;
use crate::error::{DownloadError, SegmentError};
use crate::fetcher::SegmentTask;

/// Splits `[0, total)` into consecutive ranges of `width`; the last may be shorter.
pub fn batch_ranges(total: usize, width: usize) -> impl Iterator<Item = Range<usize>> {
    let width = width.max(1);
    (0..total)
        .step_by(width)
        .map(move |start| start..(start + width).min(total))
}

/// Resolved batch, ready for the output assembler.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Decrypted payloads in ascending index order
    pub segments: Vec<(usize, Bytes)>,
    /// Failed attempts that were re-enqueued
    pub retries: usize,
}

type AttemptResult = (usize, Result<Bytes, SegmentError>);

pub struct SegmentScheduler {
    options: DownloadOptions,
    task: Arc<dyn SegmentTask>,
}

impl SegmentScheduler {
    pub fn new(options: DownloadOptions, task: Arc<dyn SegmentTask>) -> Self {
        Self {
            options: options.normalized(),
            task,
        }
    }

    pub fn options(&self) -> DownloadOptions {
        self.options
    }

    fn spawn_attempt(
        &self,
        attempts: &mut JoinSet<AttemptResult>,
        pending: &mut BTreeSet<usize>,
        index: usize,
    ) {
        let task = Arc::clone(&self.task);
        attempts.spawn(async move { (index, task.fetch_and_decrypt(index).await) });
        pending.insert(index);
    }

    /// Resolves every index of `range` within the retry budget.
    ///
    /// Each sweep round waits for as many completions as there were pending
    /// segments when the round started. A failed segment gets a fresh attempt
    /// immediately, so one that fails early in a round may be retried within the
    /// same round while one that fails late waits for the next; attempts per
    /// segment are therefore not uniform. Attempts still running when the batch
    /// returns are aborted.
    pub async fn run_batch(
        &self,
        batch: usize,
        range: Range<usize>,
    ) -> Result<BatchOutcome, DownloadError> {
        let rounds = self.options.retry_rounds;
        let mut attempts = JoinSet::new();
        let mut pending = BTreeSet::new();
        let mut resolved: BTreeMap<usize, Bytes> = BTreeMap::new();
        let mut retries = 0;

        for index in range.clone() {
            self.spawn_attempt(&mut attempts, &mut pending, index);
        }

        for round in 0..rounds {
            let will_retry = round + 1 < rounds;

            for _ in 0..pending.len() {
                let Some(joined) = attempts.join_next().await else {
                    break;
                };

                let (index, result) = match joined {
                    Ok(attempt) => attempt,
                    Err(e) => return Err(DownloadError::TaskError(e.to_string())),
                };

                match result {
                    Ok(data) => {
                        pending.remove(&index);
                        resolved.insert(index, data);
                    }
                    Err(e) if e.is_fatal() => {
                        warn!(batch, index, error = %e, "Segment failed permanently");
                        return Err(DownloadError::InvalidLocation(e.to_string()));
                    }
                    Err(e) => {
                        warn!(
                            batch,
                            index,
                            round = round + 1,
                            retry = will_retry,
                            error = %e,
                            "Part {} download error, {}",
                            index + 1,
                            if will_retry { "retrying" } else { "giving up" }
                        );
                        retries += 1;
                        self.spawn_attempt(&mut attempts, &mut pending, index);
                    }
                }
            }

            if pending.is_empty() {
                break;
            }
        }

        if !pending.is_empty() {
            let unresolved: Vec<usize> = pending.into_iter().collect();
            warn!(batch, unresolved = ?unresolved, "Batch exhausted its retry rounds");
            return Err(DownloadError::BatchExhausted {
                batch,
                unresolved: unresolved.len(),
            });
        }

        debug!(batch, range = ?range, retries, "Batch resolved");
        Ok(BatchOutcome {
            segments: resolved.into_iter().collect(),
            retries,
        })
    }
}
