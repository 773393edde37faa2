// Master playlist handling: variants are listed for the user, never downloaded.

use std::fmt;

use tracing::info;

use crate::hls::playlist::{VariantAttributes, VariantDescriptor};
use crate::hls::resolve::resolve_or_empty;

/// A variant as presented to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantListing {
    /// 1-based position in the master playlist
    pub index: usize,
    /// Absolute URL, or empty when the URI could not be resolved
    pub url: String,
    pub attributes: VariantAttributes,
}

impl fmt::Display for VariantListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}\n    info: {}", self.index, self.url, self.attributes)
    }
}

/// Resolve every variant against `base_url`, keeping master playlist order.
pub fn list_variants(variants: &[VariantDescriptor], base_url: &str) -> Vec<VariantListing> {
    variants
        .iter()
        .enumerate()
        .map(|(i, variant)| VariantListing {
            index: i + 1,
            url: resolve_or_empty(base_url, &variant.uri),
            attributes: variant.attributes.clone(),
        })
        .collect()
}

/// Log the listing so the user can pick a media playlist and re-run.
pub fn report_variants(listings: &[VariantListing]) {
    info!(
        variants = listings.len(),
        "m3u8 was a master playlist, choose a media playlist to download:"
    );
    for listing in listings {
        info!(index = listing.index, url = %listing.url, "{listing}");
    }
}
