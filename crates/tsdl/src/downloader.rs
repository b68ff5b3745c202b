// Download session: wires transport, key cache, scheduler, output and progress.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncWrite;
use tracing::{error, info};
use url::Url;

use crate::config::{DownloadOptions, DownloaderConfig};
use crate::crypto::KeyCache;
use crate::error::DownloadError;
use crate::fetcher::SegmentFetcher;
use crate::model::SegmentDescriptor;
use crate::output::OutputAssembler;
use crate::progress::{DownloadEvent, ProgressSink, ProgressSnapshot};
use crate::scheduler::{SegmentScheduler, batch_ranges};
use crate::transport::{HttpTransport, Transport};

/// Outcome of a session that wrote every segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub segments: usize,
    pub bytes: u64,
    pub retries: usize,
}

/// A failed session together with what had already been flushed, so callers
/// can tell "nothing written" from "partially written, then aborted".
#[derive(Debug, thiserror::Error)]
#[error("{error} ({segments_written} segments, {bytes_written} bytes already written)")]
pub struct SessionFailure {
    #[source]
    pub error: DownloadError,
    pub segments_written: usize,
    pub bytes_written: u64,
}

impl SessionFailure {
    fn before_output(error: DownloadError) -> Self {
        Self {
            error,
            segments_written: 0,
            bytes_written: 0,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.segments_written > 0
    }
}

/// One download of one playlist. Owns the key cache for its lifetime.
pub struct DownloadSession {
    segments: Arc<[SegmentDescriptor]>,
    options: DownloadOptions,
    scheduler: SegmentScheduler,
    progress: Option<ProgressSink>,
}

impl DownloadSession {
    pub fn new(
        segments: impl Into<Arc<[SegmentDescriptor]>>,
        base: Option<Url>,
        transport: Arc<dyn Transport>,
        options: DownloadOptions,
    ) -> Self {
        let segments = segments.into();
        let options = options.normalized();
        let fetcher = SegmentFetcher::new(segments.clone(), base, transport, KeyCache::new());
        Self {
            segments,
            options,
            scheduler: SegmentScheduler::new(options, Arc::new(fetcher)),
            progress: None,
        }
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        match &self.progress {
            Some(sink) => sink(event),
            None => {
                if let DownloadEvent::BatchCompleted { progress, .. } = event {
                    info!(
                        completed = progress.completed,
                        total = progress.total,
                        percent = progress.percent,
                        eta_secs = progress.eta.map(|eta| eta.as_secs()),
                        "{} parts of {} downloaded [{}%]",
                        progress.completed,
                        progress.total,
                        progress.percent
                    );
                }
            }
        }
    }

    /// Runs every batch in order, appending each one to `output` once it is
    /// fully resolved. Batches written before a failure stay written.
    pub async fn run<W>(
        self,
        output: &mut OutputAssembler<W>,
    ) -> Result<DownloadSummary, DownloadError>
    where
        W: AsyncWrite + Unpin,
    {
        let total = self.segments.len();
        let width = self.options.concurrency_width;
        let started = Instant::now();
        let mut retries = 0;

        info!(
            total,
            concurrency = width,
            retry_rounds = self.options.retry_rounds,
            "Starting segment download"
        );
        self.emit(DownloadEvent::Started {
            total,
            batches: total.div_ceil(width),
        });

        for (batch, range) in batch_ranges(total, width).enumerate() {
            let end = range.end;
            let outcome = self.scheduler.run_batch(batch, range).await?;
            retries += outcome.retries;

            output.append_batch(&outcome.segments).await?;

            self.emit(DownloadEvent::BatchCompleted {
                batch,
                retries: outcome.retries,
                progress: ProgressSnapshot::compute(started.elapsed(), end, total),
            });
        }

        let summary = DownloadSummary {
            segments: output.segments_written(),
            bytes: output.bytes_written(),
            retries,
        };
        self.emit(DownloadEvent::Finished {
            segments: summary.segments,
            bytes: summary.bytes,
        });
        info!(
            segments = summary.segments,
            bytes = summary.bytes,
            retries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Download finished"
        );
        Ok(summary)
    }
}

/// Downloads `segments` into `writer` through `transport`.
///
/// Per-segment failures are retried within the batch budget; the first
/// fatal error ends the session and is returned with the amount already
/// written.
pub async fn download_with_transport<W>(
    segments: impl Into<Arc<[SegmentDescriptor]>>,
    base: Option<Url>,
    transport: Arc<dyn Transport>,
    options: DownloadOptions,
    writer: W,
    progress: Option<ProgressSink>,
) -> Result<DownloadSummary, SessionFailure>
where
    W: AsyncWrite + Unpin,
{
    let session = DownloadSession::new(segments, base, transport, options);
    run_into(session, OutputAssembler::new(writer), progress).await
}

async fn run_into<W>(
    mut session: DownloadSession,
    mut output: OutputAssembler<W>,
    progress: Option<ProgressSink>,
) -> Result<DownloadSummary, SessionFailure>
where
    W: AsyncWrite + Unpin,
{
    if let Some(sink) = progress {
        session = session.with_progress(sink);
    }

    let result = session.run(&mut output).await;
    let segments_written = output.segments_written();
    let bytes_written = output.bytes_written();
    let flushed = output.finish().await;

    match (result, flushed) {
        (Ok(summary), Ok(_)) => Ok(summary),
        (Err(error), _) | (Ok(_), Err(error)) => {
            error!(
                error = %error,
                segments_written,
                bytes_written,
                "Download failed"
            );
            Err(SessionFailure {
                error,
                segments_written,
                bytes_written,
            })
        }
    }
}

/// Downloads `segments` over HTTP(S) as configured by `config`.
pub async fn download<W>(
    segments: impl Into<Arc<[SegmentDescriptor]>>,
    base: Option<Url>,
    config: &DownloaderConfig,
    options: DownloadOptions,
    writer: W,
    progress: Option<ProgressSink>,
) -> Result<DownloadSummary, SessionFailure>
where
    W: AsyncWrite + Unpin,
{
    let transport = HttpTransport::new(config).map_err(SessionFailure::before_output)?;
    download_with_transport(segments, base, Arc::new(transport), options, writer, progress).await
}

/// Like [`download`], appending to the file at `path`.
pub async fn download_to_file(
    segments: impl Into<Arc<[SegmentDescriptor]>>,
    base: Option<Url>,
    config: &DownloaderConfig,
    options: DownloadOptions,
    path: impl AsRef<Path>,
    progress: Option<ProgressSink>,
) -> Result<DownloadSummary, SessionFailure> {
    let transport = HttpTransport::new(config).map_err(SessionFailure::before_output)?;
    download_file_with_transport(segments, base, Arc::new(transport), options, path, progress)
        .await
}

/// Like [`download_with_transport`], appending to the file at `path`.
pub async fn download_file_with_transport(
    segments: impl Into<Arc<[SegmentDescriptor]>>,
    base: Option<Url>,
    transport: Arc<dyn Transport>,
    options: DownloadOptions,
    path: impl AsRef<Path>,
    progress: Option<ProgressSink>,
) -> Result<DownloadSummary, SessionFailure> {
    let output = OutputAssembler::create(path)
        .await
        .map_err(SessionFailure::before_output)?;
    let session = DownloadSession::new(segments, base, transport, options);
    run_into(session, output, progress).await
}
