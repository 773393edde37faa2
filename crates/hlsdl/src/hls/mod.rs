// HLS playlist download: fetch, classify, then dispatch segments or list variants.

pub mod dispatcher;
pub mod downloader;
pub mod fetcher;
pub mod playlist;
pub mod progress;
pub mod resolve;
pub mod segment;
pub mod variants;

pub use dispatcher::{DispatchSummary, SegmentDispatcher};
pub use downloader::{DownloadReport, HlsDownloader};
pub use fetcher::{PlaylistFetcher, PlaylistReference};
pub use playlist::{
    MasterPlaylist, MediaPlaylist, PlaylistDocument, SegmentDescriptor, VariantAttributes,
    VariantDescriptor, classify,
};
pub use progress::{ProgressCallback, ProgressEvent, ProgressState, SegmentOutcome, format_duration};
pub use resolve::{resolve_url, url_basename};
pub use segment::{SegmentDownloader, SegmentFetcher};
pub use variants::{VariantListing, list_variants};
