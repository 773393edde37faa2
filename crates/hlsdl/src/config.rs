// Download configuration and HTTP client construction.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::debug;

use crate::DownloadError;

pub const DEFAULT_USER_AGENT: &str = concat!("hlsdl/", env!("CARGO_PKG_VERSION"));

/// Default number of download slots.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default output directory, relative to the process working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "out";

const MAX_REDIRECTS: usize = 10;

/// Configurable options for the HTTP layer
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for a whole request. Zero means no timeout.
    pub timeout: Duration,

    /// Connection timeout. Zero means no timeout.
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            // A hung request holds its download slot; no deadline is imposed by default.
            timeout: Duration::ZERO,
            connect_timeout: Duration::ZERO,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            use_system_proxy: true,
        }
    }
}

impl DownloaderConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers
    }
}

/// Configuration for one download invocation.
#[derive(Debug, Clone)]
pub struct HlsDownloadConfig {
    /// Directory receiving the playlist copy and every segment
    pub output_dir: PathBuf,

    /// Number of segment downloads allowed in flight at once
    pub concurrency: usize,

    /// Re-download segments even when a file with the same name already exists
    pub force_download: bool,

    /// HTTP client settings
    pub downloader: DownloaderConfig,
}

impl Default for HlsDownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            concurrency: DEFAULT_CONCURRENCY,
            force_download: false,
            downloader: DownloaderConfig::default(),
        }
    }
}

impl HlsDownloadConfig {
    pub fn builder() -> HlsDownloadConfigBuilder {
        HlsDownloadConfigBuilder::new()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.concurrency == 0 {
            return Err(DownloadError::configuration(
                "concurrency limit must be at least 1",
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(DownloadError::configuration(
                "output directory must not be empty",
            ));
        }
        Ok(())
    }
}

/// Builder for [`HlsDownloadConfig`]
#[derive(Debug, Clone, Default)]
pub struct HlsDownloadConfigBuilder {
    config: HlsDownloadConfig,
}

impl HlsDownloadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = output_dir.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn with_force_download(mut self, force_download: bool) -> Self {
        self.config.force_download = force_download;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.downloader.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.downloader.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.config.downloader.connect_timeout = connect_timeout;
        self
    }

    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.config.downloader.use_system_proxy = use_system_proxy;
        self
    }

    pub fn build(self) -> HlsDownloadConfig {
        self.config
    }
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
            // Another crate may have installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    install_rustls_provider();

    let mut client_builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if !config.use_system_proxy {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled for downloads");
    }

    client_builder.build().map_err(DownloadError::from)
}
