// HLS Segment Fetcher: downloads one media segment into the output directory.

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, trace};

use crate::DownloadError;
use crate::hls::progress::SegmentOutcome;
use crate::hls::resolve::url_basename;

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Download the segment at the absolute `url`.
    ///
    /// Implementations must not retry; the dispatcher treats every error as
    /// final for that segment.
    async fn download(&self, url: &str) -> Result<SegmentOutcome, DownloadError>;
}

/// Fetch-and-save over HTTP with an idempotent skip for files already on disk.
#[derive(Clone)]
pub struct SegmentFetcher {
    http_client: Client,
    output_dir: PathBuf,
    force_download: bool,
}

impl SegmentFetcher {
    pub fn new(http_client: Client, output_dir: impl Into<PathBuf>, force_download: bool) -> Self {
        Self {
            http_client,
            output_dir: output_dir.into(),
            force_download,
        }
    }

    /// Local path for a segment URL: `output_dir/<last path segment>`.
    ///
    /// Distinct URLs sharing a last path segment map to the same file.
    pub fn target_path(&self, url: &str) -> Result<PathBuf, DownloadError> {
        let name = url_basename(url).ok_or_else(|| DownloadError::MissingFileName {
            url: url.to_string(),
        })?;
        Ok(self.output_dir.join(name))
    }
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    async fn download(&self, url: &str) -> Result<SegmentOutcome, DownloadError> {
        let path = self.target_path(url)?;

        if !self.force_download && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            trace!(url = %url, path = %path.display(), "Segment already exists, skipping");
            return Ok(SegmentOutcome::Skipped);
        }

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(status, url, "segment fetch"));
        }

        let data = response.bytes().await?;
        tokio::fs::write(&path, &data).await?;

        debug!(url = %url, size = data.len(), path = %path.display(), "Downloaded segment");
        Ok(SegmentOutcome::Downloaded {
            bytes: data.len() as u64,
        })
    }
}
