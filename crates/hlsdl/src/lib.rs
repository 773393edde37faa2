pub mod config;
pub mod error;
pub mod hls;

pub use config::{DownloaderConfig, HlsDownloadConfig, HlsDownloadConfigBuilder, create_client};
pub use error::DownloadError;
pub use hls::{
    DispatchSummary, DownloadReport, HlsDownloader, ProgressCallback, ProgressEvent,
    SegmentOutcome, VariantListing, format_duration,
};
