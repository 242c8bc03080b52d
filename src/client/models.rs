//! Catalog API response models.

use serde::{Deserialize, Serialize};

use crate::library::track::{Track, TrackId};

/// Quality tier offered by the catalog for a track.
///
/// Tiers map onto the catalog's numeric quality levels; `lower()` is the
/// fallback order used by the download pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Standard,
    High,
    Lossless,
}

impl Quality {
    /// Numeric level understood by the catalog API.
    pub fn level(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Standard => 2,
            Self::High => 5,
            Self::Lossless => 9,
        }
    }

    /// The next lower tier, if any.
    pub fn lower(self) -> Option<Self> {
        match self {
            Self::Low => None,
            Self::Standard => Some(Self::Low),
            Self::High => Some(Self::Standard),
            Self::Lossless => Some(Self::High),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Lossless => "lossless",
        }
    }
}

/// Resolved stream details for a track at a given quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicDetails {
    /// Streaming/download URI.
    pub uri: String,
    /// Payload size in bytes, when the catalog reports it.
    pub size: Option<u64>,
    /// Bitrate in kbps, when reported.
    pub bitrate: Option<u32>,
    /// Cover art URL, when reported.
    pub cover: Option<String>,
}

// ============================================================================
// Search endpoint (Netease shape: { code, result: { songs: [...] } })
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub code: i64,
    #[serde(default)]
    pub result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub songs: Vec<SearchSong>,
}

#[derive(Debug, Deserialize)]
pub struct SearchSong {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SearchArtist>,
    #[serde(default)]
    pub album: Option<SearchAlbum>,
    /// Duration in milliseconds.
    #[serde(default)]
    pub duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchAlbum {
    pub name: String,
}

impl From<SearchSong> for Track {
    fn from(song: SearchSong) -> Self {
        let artist = if song.artists.is_empty() {
            String::from("Unknown")
        } else {
            song.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(" / ")
        };

        Track {
            id: TrackId::Remote(song.id),
            title: song.name,
            artist,
            album: song
                .album
                .map(|a| a.name)
                .unwrap_or_else(|| String::from("Unknown")),
            duration: song.duration.map(|ms| (ms / 1000) as u32),
            lyrics: None,
        }
    }
}

// ============================================================================
// Details / lyrics endpoints (vkeys shape: { code, message, data: {...} })
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DetailsResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<DetailsData>,
}

#[derive(Debug, Deserialize)]
pub struct DetailsData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub br: Option<u32>,
    #[serde(default, alias = "pic")]
    pub cover: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LyricsResponse {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<LyricsData>,
}

#[derive(Debug, Deserialize)]
pub struct LyricsData {
    #[serde(default)]
    pub lrc: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_fallback_order_terminates_at_low() {
        assert_eq!(Quality::Lossless.lower(), Some(Quality::High));
        assert_eq!(Quality::High.lower(), Some(Quality::Standard));
        assert_eq!(Quality::Standard.lower(), Some(Quality::Low));
        assert_eq!(Quality::Low.lower(), None);
    }

    #[test]
    fn search_song_converts_to_remote_track() {
        let json = r#"{
            "id": 12345,
            "name": "Song",
            "artists": [{"name": "A"}, {"name": "B"}],
            "album": {"name": "LP"},
            "duration": 215000
        }"#;
        let song: SearchSong = serde_json::from_str(json).unwrap();
        let track = Track::from(song);

        assert_eq!(track.id, TrackId::Remote(12345));
        assert_eq!(track.artist, "A / B");
        assert_eq!(track.album, "LP");
        assert_eq!(track.duration, Some(215));
        assert!(track.is_remote());
    }

    #[test]
    fn search_song_without_metadata_gets_placeholders() {
        let song: SearchSong = serde_json::from_str(r#"{"id": 1, "name": "X"}"#).unwrap();
        let track = Track::from(song);
        assert_eq!(track.artist, "Unknown");
        assert_eq!(track.album, "Unknown");
        assert_eq!(track.duration, None);
    }
}
