// HLS Downloader: fetches a playlist and either downloads its segments or lists its variants.

use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{HlsDownloadConfig, create_client};
use crate::hls::dispatcher::{DispatchSummary, SegmentDispatcher};
use crate::hls::fetcher::{PlaylistFetcher, PlaylistReference};
use crate::hls::playlist::{PlaylistDocument, classify};
use crate::hls::progress::{ProgressCallback, format_duration};
use crate::hls::segment::{SegmentDownloader, SegmentFetcher};
use crate::hls::variants::{VariantListing, list_variants, report_variants};
use crate::DownloadError;

/// What a completed run did.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadReport {
    /// The playlist was a media playlist and its segments were dispatched.
    Media(DispatchSummary),
    /// The playlist was a master playlist; nothing was downloaded.
    Master(Vec<VariantListing>),
}

pub struct HlsDownloader {
    config: HlsDownloadConfig,
    http_client: Client,
    on_progress: Option<ProgressCallback>,
}

impl HlsDownloader {
    pub fn new(config: HlsDownloadConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        let http_client = create_client(&config.downloader)?;
        Ok(Self::with_client(config, http_client))
    }

    /// Use an existing HTTP client. The config is not validated here.
    pub fn with_client(config: HlsDownloadConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Download the playlist at `url` into the output directory.
    ///
    /// Fatal errors (output directory, playlist fetch or parse) are returned
    /// before any segment is requested. Per-segment failures only show up in
    /// the returned summary.
    pub async fn run(&self, url: &str) -> Result<DownloadReport, DownloadError> {
        let output_dir = self.config.output_dir();
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| DownloadError::OutputDirectory {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let fetcher = PlaylistFetcher::new(self.http_client.clone(), output_dir);
        let PlaylistReference { final_url, raw, .. } = fetcher.fetch(url).await?;

        let document = classify(&raw)?;
        debug!(kind = document.kind(), url = %final_url, "Playlist classified");

        match document {
            PlaylistDocument::Media(playlist) => {
                info!(
                    segments = playlist.segments.len(),
                    duration = %format_duration(playlist.total_duration()),
                    concurrency = self.config.concurrency,
                    "Downloading media playlist"
                );
                let downloader: Arc<dyn SegmentDownloader> = Arc::new(SegmentFetcher::new(
                    self.http_client.clone(),
                    output_dir,
                    self.config.force_download,
                ));
                let mut dispatcher = SegmentDispatcher::new(downloader, self.config.concurrency);
                if let Some(on_progress) = &self.on_progress {
                    dispatcher = dispatcher.with_progress(on_progress.clone());
                }
                let summary = dispatcher.dispatch(&playlist.segments, &final_url).await;
                Ok(DownloadReport::Media(summary))
            }
            PlaylistDocument::Master(playlist) => {
                let listings = list_variants(&playlist.variants, &final_url);
                report_variants(&listings);
                Ok(DownloadReport::Master(listings))
            }
        }
    }
}
