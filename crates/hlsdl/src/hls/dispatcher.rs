// HLS Segment Dispatcher: admits segments into a fixed number of download slots.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::hls::playlist::SegmentDescriptor;
use crate::hls::progress::{
    ProgressCallback, ProgressEvent, ProgressState, SegmentOutcome, format_duration,
};
use crate::hls::resolve::resolve_or_empty;
use crate::hls::segment::SegmentDownloader;

/// Totals for one dispatch run.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSummary {
    pub total: usize,
    pub admitted: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub accumulated_duration: f64,
}

#[derive(Debug, Default)]
struct OutcomeTally {
    downloaded: usize,
    skipped: usize,
    failed: usize,
}

impl OutcomeTally {
    fn record(&mut self, outcome: SegmentOutcome) {
        match outcome {
            SegmentOutcome::Downloaded { .. } => self.downloaded += 1,
            SegmentOutcome::Skipped => self.skipped += 1,
            SegmentOutcome::Failed => self.failed += 1,
        }
    }

    fn record_joined(&mut self, result: Result<SegmentOutcome, JoinError>) {
        match result {
            Ok(outcome) => self.record(outcome),
            Err(join_err) => {
                if join_err.is_panic() {
                    warn!(error = ?join_err, "Task panicked during segment download");
                } else {
                    warn!(error = ?join_err, "Task canceled during segment download");
                }
                self.failed += 1;
            }
        }
    }
}

pub struct SegmentDispatcher {
    downloader: Arc<dyn SegmentDownloader>,
    concurrency: usize,
    on_progress: Option<ProgressCallback>,
}

impl SegmentDispatcher {
    pub fn new(downloader: Arc<dyn SegmentDownloader>, concurrency: usize) -> Self {
        Self {
            downloader,
            concurrency: concurrency.max(1),
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(event);
        }
    }

    /// Download every segment, at most `concurrency` at a time.
    ///
    /// Segments are resolved against `base_url` and admitted in playlist
    /// order; a segment is admitted only once a slot is free. Progress is
    /// counted on admission. Returns after every admitted download has
    /// finished and released its slot. Individual failures are logged and
    /// never abort the batch.
    pub async fn dispatch(&self, segments: &[SegmentDescriptor], base_url: &str) -> DispatchSummary {
        let total = segments.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut progress = ProgressState::new(total);
        let mut tally = OutcomeTally::default();
        let mut tasks = JoinSet::new();

        debug!(
            segments = total,
            concurrency = self.concurrency,
            base_url = %base_url,
            "Starting segment dispatch"
        );

        for segment in segments {
            let url = resolve_or_empty(base_url, &segment.uri);

            // Semaphore hands out permits in request order.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Download slot pool closed unexpectedly");
                    break;
                }
            };

            progress.admit(segment.duration);
            info!(
                index = progress.completed(),
                total = progress.total(),
                "going to download [{}/{} ({})] file: {}",
                progress.completed(),
                progress.total(),
                format_duration(progress.accumulated_duration()),
                url
            );
            self.emit(ProgressEvent::Admitted {
                completed: progress.completed(),
                total,
                accumulated_duration: progress.accumulated_duration(),
                url: url.clone(),
            });

            if url.is_empty() {
                warn!(uri = %segment.uri, "Skipping segment with unresolvable URL");
                drop(permit);
                tally.record(SegmentOutcome::Failed);
                self.emit(ProgressEvent::Finished {
                    url,
                    outcome: SegmentOutcome::Failed,
                });
                continue;
            }

            let downloader = self.downloader.clone();
            let on_progress = self.on_progress.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = match downloader.download(&url).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(url = %url, "download url: {} error: {}", url, e);
                        SegmentOutcome::Failed
                    }
                };
                if let Some(on_progress) = on_progress {
                    on_progress(ProgressEvent::Finished { url, outcome });
                }
                outcome
            });

            while let Some(result) = tasks.try_join_next() {
                tally.record_joined(result);
            }
        }

        while let Some(result) = tasks.join_next().await {
            tally.record_joined(result);
        }

        if !progress.is_complete() {
            warn!(
                admitted = progress.completed(),
                total = progress.total(),
                "Dispatch stopped before every segment was admitted"
            );
        }

        // Every slot must be back in the pool before reporting completion.
        let slots = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        if semaphore.acquire_many(slots).await.is_err() {
            error!("Download slot pool closed while draining");
        }

        let summary = DispatchSummary {
            total,
            admitted: progress.completed(),
            downloaded: tally.downloaded,
            skipped: tally.skipped,
            failed: tally.failed,
            accumulated_duration: progress.accumulated_duration(),
        };

        info!(
            total = summary.total,
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            duration = %format_duration(summary.accumulated_duration),
            "all download complete"
        );

        summary
    }
}
