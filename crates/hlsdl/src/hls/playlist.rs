// HLS playlist classification: turns raw playlist bytes into a typed document.

use std::fmt;

use m3u8_rs::parse_playlist_res;
use tracing::debug;

use crate::DownloadError;

/// One downloadable media segment, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    /// Segment URI as written in the playlist (possibly relative)
    pub uri: String,
    /// Declared playback duration in seconds
    pub duration: f64,
}

/// Stream attributes of a variant, passed through for display only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantAttributes {
    pub bandwidth: u64,
    pub average_bandwidth: Option<u64>,
    pub codecs: Option<String>,
    pub resolution: Option<(u64, u64)>,
    pub frame_rate: Option<f64>,
    pub audio: Option<String>,
    pub video: Option<String>,
    pub subtitles: Option<String>,
    pub is_i_frame: bool,
}

impl fmt::Display for VariantAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bandwidth={}", self.bandwidth)?;
        if let Some(average) = self.average_bandwidth {
            write!(f, " average_bandwidth={average}")?;
        }
        if let Some((width, height)) = self.resolution {
            write!(f, " resolution={width}x{height}")?;
        }
        if let Some(frame_rate) = self.frame_rate {
            write!(f, " frame_rate={frame_rate}")?;
        }
        if let Some(codecs) = &self.codecs {
            write!(f, " codecs=\"{codecs}\"")?;
        }
        if let Some(audio) = &self.audio {
            write!(f, " audio={audio}")?;
        }
        if let Some(video) = &self.video {
            write!(f, " video={video}")?;
        }
        if let Some(subtitles) = &self.subtitles {
            write!(f, " subtitles={subtitles}")?;
        }
        if self.is_i_frame {
            write!(f, " i_frame_only")?;
        }
        Ok(())
    }
}

/// One alternative stream referenced by a master playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantDescriptor {
    /// Variant playlist URI as written in the master playlist (possibly relative)
    pub uri: String,
    pub attributes: VariantAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaPlaylist {
    pub segments: Vec<SegmentDescriptor>,
    pub target_duration: u64,
    pub end_list: bool,
}

impl MediaPlaylist {
    /// Sum of the declared segment durations, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MasterPlaylist {
    pub variants: Vec<VariantDescriptor>,
}

/// A parsed playlist. The two shapes are mutually exclusive and decided by
/// the document itself.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistDocument {
    Media(MediaPlaylist),
    Master(MasterPlaylist),
}

impl PlaylistDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            PlaylistDocument::Media(_) => "media",
            PlaylistDocument::Master(_) => "master",
        }
    }
}

impl From<m3u8_rs::MediaPlaylist> for MediaPlaylist {
    fn from(playlist: m3u8_rs::MediaPlaylist) -> Self {
        let segments = playlist
            .segments
            .into_iter()
            .map(|segment| SegmentDescriptor {
                uri: segment.uri,
                duration: f64::from(segment.duration),
            })
            .collect();
        Self {
            segments,
            target_duration: playlist.target_duration,
            end_list: playlist.end_list,
        }
    }
}

impl From<m3u8_rs::MasterPlaylist> for MasterPlaylist {
    fn from(playlist: m3u8_rs::MasterPlaylist) -> Self {
        let variants = playlist
            .variants
            .into_iter()
            .map(|variant| VariantDescriptor {
                attributes: VariantAttributes {
                    bandwidth: variant.bandwidth,
                    average_bandwidth: variant.average_bandwidth,
                    codecs: variant.codecs,
                    resolution: variant.resolution.map(|r| (r.width, r.height)),
                    frame_rate: variant.frame_rate.map(f64::from),
                    audio: variant.audio,
                    video: variant.video,
                    subtitles: variant.subtitles,
                    is_i_frame: variant.is_i_frame,
                },
                uri: variant.uri,
            })
            .collect();
        Self { variants }
    }
}

/// Parse raw playlist bytes into a [`PlaylistDocument`].
///
/// Anything that is not a syntactically valid media or master playlist is an
/// [`DownloadError::Playlist`] error.
pub fn classify(bytes: &[u8]) -> Result<PlaylistDocument, DownloadError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(DownloadError::playlist("playlist document is empty"));
    }

    let document = match parse_playlist_res(bytes) {
        Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => PlaylistDocument::Media(pl.into()),
        Ok(m3u8_rs::Playlist::MasterPlaylist(pl)) => PlaylistDocument::Master(pl.into()),
        Err(e) => {
            return Err(DownloadError::playlist(format!(
                "failed to parse playlist: {e}"
            )));
        }
    };

    match &document {
        PlaylistDocument::Media(pl) => debug!(
            segments = pl.segments.len(),
            target_duration = pl.target_duration,
            end_list = pl.end_list,
            "Classified media playlist"
        ),
        PlaylistDocument::Master(pl) => {
            debug!(variants = pl.variants.len(), "Classified master playlist")
        }
    }

    Ok(document)
}
