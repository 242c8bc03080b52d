//! The track data model shared by the library, playlists, and playback.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Track identity: a local file or a catalog entry, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackId {
    /// Absolute path of a local audio file.
    Local(PathBuf),
    /// Catalog song id.
    Remote(u64),
}

/// A logical song reference, local or remote.
///
/// Immutable once constructed. A remote track becomes local only through the
/// download pipeline, which creates a fresh `Track` with a `Local` id.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds; unknown for remote tracks until resolved.
    pub duration: Option<u32>,
    /// Embedded lyrics, when a local file carries them.
    pub lyrics: Option<String>,
}

impl Track {
    pub fn is_remote(&self) -> bool {
        matches!(self.id, TrackId::Remote(_))
    }

    pub fn is_local(&self) -> bool {
        matches!(self.id, TrackId::Local(_))
    }

    /// Path of the underlying file for local tracks.
    pub fn local_path(&self) -> Option<&Path> {
        match &self.id {
            TrackId::Local(path) => Some(path),
            TrackId::Remote(_) => None,
        }
    }

    /// Catalog id for remote tracks.
    pub fn remote_id(&self) -> Option<u64> {
        match self.id {
            TrackId::Remote(id) => Some(id),
            TrackId::Local(_) => None,
        }
    }

    /// The URI handed to the player process.
    pub fn playback_uri(&self) -> Option<String> {
        self.local_path().map(|p| p.display().to_string())
    }
}

/// Format seconds as `MM:SS`.
pub fn format_duration(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_mutually_exclusive() {
        let local = Track {
            id: TrackId::Local(PathBuf::from("/music/a.mp3")),
            title: String::from("a"),
            artist: String::from("x"),
            album: String::from("y"),
            duration: Some(10),
            lyrics: None,
        };
        assert!(local.is_local());
        assert!(!local.is_remote());
        assert_eq!(local.remote_id(), None);
        assert_eq!(local.local_path(), Some(Path::new("/music/a.mp3")));
    }

    #[test]
    fn formats_duration() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(215), "03:35");
        assert_eq!(format_duration(3600), "60:00");
    }

    #[test]
    fn track_id_round_trips_through_json() {
        let id = TrackId::Remote(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<TrackId>(&json).unwrap(), id);

        let id = TrackId::Local(PathBuf::from("/m/a.flac"));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(serde_json::from_str::<TrackId>(&json).unwrap(), id);
    }
}
