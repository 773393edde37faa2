// HLS Playlist Fetcher: retrieves the playlist document and remembers where it was served from.

use bytes::Bytes;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

use crate::DownloadError;
use crate::hls::resolve::url_basename;

/// File name used for the local playlist copy when the final URL has none.
const FALLBACK_PLAYLIST_NAME: &str = "index.m3u8";

/// The fetched playlist document.
///
/// `final_url` is the URL after all redirects. Relative segment and variant
/// URIs are resolved against it, never against `requested_url`.
#[derive(Debug, Clone)]
pub struct PlaylistReference {
    pub requested_url: String,
    pub final_url: String,
    pub raw: Bytes,
}

pub struct PlaylistFetcher {
    http_client: Client,
    output_dir: PathBuf,
}

impl PlaylistFetcher {
    pub fn new(http_client: Client, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            http_client,
            output_dir: output_dir.into(),
        }
    }

    /// Fetch `url`, following redirects, and save a copy into the output directory.
    ///
    /// Network failures and non-success statuses are returned as
    /// [`DownloadError::PlaylistFetch`]. A failure to save the local copy is
    /// only logged.
    pub async fn fetch(&self, url: &str) -> Result<PlaylistReference, DownloadError> {
        let playlist_url = Url::parse(url).map_err(|e| {
            DownloadError::playlist_fetch(url, DownloadError::invalid_url(url, e.to_string()))
        })?;

        info!(url = %playlist_url, "Downloading HLS playlist");

        let response = self
            .http_client
            .get(playlist_url)
            .send()
            .await
            .map_err(|e| DownloadError::playlist_fetch(url, e.into()))?;

        let final_url = response.url().to_string();
        if final_url != url {
            debug!(requested = %url, final_url = %final_url, "Playlist request was redirected");
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::playlist_fetch(
                url,
                DownloadError::http_status(status, &final_url, "playlist fetch"),
            ));
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| DownloadError::playlist_fetch(url, e.into()))?;

        self.persist(&final_url, &raw).await;

        Ok(PlaylistReference {
            requested_url: url.to_string(),
            final_url,
            raw,
        })
    }

    /// Path the playlist copy is written to for a given final URL.
    pub fn local_path(&self, final_url: &str) -> PathBuf {
        let name = url_basename(final_url).unwrap_or_else(|| FALLBACK_PLAYLIST_NAME.to_string());
        self.output_dir.join(name)
    }

    async fn persist(&self, final_url: &str, raw: &Bytes) {
        let path = self.local_path(final_url);
        match tokio::fs::write(&path, raw).await {
            Ok(()) => info!(path = %path.display(), "m3u8 save as: {}", display_name(&path)),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to save playlist copy, continuing with in-memory document"
            ),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
