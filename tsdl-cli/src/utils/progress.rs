use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};
use tracing::info;
use tsdl_engine::{DownloadEvent, ProgressSnapshot};

use super::{format_bytes, format_eta};

fn segment_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} segments {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Renders session events as a terminal progress bar, or as log lines when
/// disabled.
#[derive(Clone)]
pub struct ProgressManager {
    bar: Arc<Mutex<Option<ProgressBar>>>,
    disabled: bool,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            bar: Arc::new(Mutex::new(None)),
            disabled: false,
        }
    }

    pub fn new_disabled() -> Self {
        Self {
            bar: Arc::new(Mutex::new(None)),
            disabled: true,
        }
    }

    pub fn handle_event(&self, event: DownloadEvent) {
        if self.disabled {
            log_event(&event);
            return;
        }

        let Ok(mut bar) = self.bar.lock() else {
            return;
        };
        match event {
            DownloadEvent::Started { total, .. } => {
                let new_bar = ProgressBar::new(total as u64);
                new_bar.set_style(segment_style());
                new_bar.enable_steady_tick(std::time::Duration::from_millis(500));
                *bar = Some(new_bar);
            }
            DownloadEvent::BatchCompleted { progress, .. } => {
                if let Some(bar) = bar.as_ref() {
                    bar.set_position(progress.completed as u64);
                    bar.set_message(status_line(&progress));
                }
            }
            DownloadEvent::Finished { segments, bytes } => {
                if let Some(bar) = bar.take() {
                    bar.finish_with_message(format!(
                        "done, {segments} segments, {}",
                        format_bytes(bytes)
                    ));
                }
            }
        }
    }

    /// Clears an unfinished bar after a failed session.
    pub fn abandon(&self) {
        if let Ok(mut bar) = self.bar.lock()
            && let Some(bar) = bar.take()
        {
            bar.abandon();
        }
    }
}

fn status_line(progress: &ProgressSnapshot) -> String {
    match progress.eta {
        Some(eta) if !progress.is_complete() => {
            format!("{}% ETA {}", progress.percent, format_eta(eta))
        }
        _ => format!("{}%", progress.percent),
    }
}

fn log_event(event: &DownloadEvent) {
    match event {
        DownloadEvent::Started { total, batches } => {
            info!(segments = total, batches, "Download started");
        }
        DownloadEvent::BatchCompleted {
            batch,
            retries,
            progress,
        } => {
            info!(
                batch,
                retries,
                "Progress {}/{} {}",
                progress.completed,
                progress.total,
                status_line(progress)
            );
        }
        DownloadEvent::Finished { segments, bytes } => {
            info!(segments, size = %format_bytes(*bytes), "Download finished");
        }
    }
}
