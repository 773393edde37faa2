use reqwest::StatusCode;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("malformed base URL `{base}`: {reason}")]
    MalformedBaseUrl { base: String, reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to fetch playlist {url}: {source}")]
    PlaylistFetch {
        url: String,
        #[source]
        source: Box<DownloadError>,
    },

    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported or invalid playlist: {reason}")]
    Playlist { reason: String },

    #[error("no file name can be derived from URL `{url}`")]
    MissingFileName { url: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl DownloadError {
    pub fn malformed_base_url(base: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedBaseUrl {
            base: base.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn playlist_fetch(url: impl Into<String>, source: DownloadError) -> Self {
        Self::PlaylistFetch {
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether this error aborts a whole download run.
    ///
    /// Playlist retrieval, playlist classification, output directory creation
    /// and configuration problems stop the run. Everything else is scoped to
    /// a single segment or variant and is logged and skipped by the caller.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::PlaylistFetch { .. }
            | Self::OutputDirectory { .. }
            | Self::Playlist { .. }
            | Self::Configuration { .. } => true,
            Self::MalformedBaseUrl { .. }
            | Self::InvalidUrl { .. }
            | Self::Network { .. }
            | Self::HttpStatus { .. }
            | Self::Io { .. }
            | Self::MissingFileName { .. } => false,
        }
    }
}
