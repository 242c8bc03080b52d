//! Persistent playlist store.
//!
//! Named, ordered collections of track identity records, written through to
//! a single JSON file on every mutation. A mutation that cannot be persisted
//! fails entirely: the in-memory state is reverted to the last persisted
//! value, so a crash can never leave memory and disk disagreeing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::track::{Track, TrackId};

/// Name of the playlist every fresh store starts with.
const DEFAULT_PLAYLIST: &str = "Favorites";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("playlist '{0}' not found")]
    NotFound(String),

    #[error("playlist '{0}' already exists")]
    AlreadyExists(String),

    #[error("failed to persist playlists: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("failed to encode playlists: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One playlist entry: track identity plus denormalized display fields, so
/// lists render without re-resolving against the catalog or the filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub duration: Option<u32>,
}

impl From<&Track> for PlaylistEntry {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration: track.duration,
        }
    }
}

impl PlaylistEntry {
    pub fn to_track(&self) -> Track {
        Track {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration: self.duration,
            lyrics: None,
        }
    }
}

/// The on-disk and in-memory playlist collection.
///
/// Mutating methods take `&mut self`, which statically gives each
/// read-modify-persist sequence exclusive access to the store.
#[derive(Debug)]
pub struct PlaylistStore {
    path: PathBuf,
    playlists: BTreeMap<String, Vec<PlaylistEntry>>,
}

impl PlaylistStore {
    /// Load the store from `path`, falling back to a default store when the
    /// file is missing or unreadable.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let playlists = if path.exists() {
            match std::fs::read_to_string(path)
                .map_err(StoreError::from)
                .and_then(|s| serde_json::from_str(&s).map_err(StoreError::from))
            {
                Ok(map) => map,
                Err(err) => {
                    tracing::warn!("unreadable playlist store, starting fresh: {err}");
                    Self::default_playlists()
                }
            }
        } else {
            Self::default_playlists()
        };

        Ok(Self {
            path: path.to_path_buf(),
            playlists,
        })
    }

    fn default_playlists() -> BTreeMap<String, Vec<PlaylistEntry>> {
        BTreeMap::from([(String::from(DEFAULT_PLAYLIST), Vec::new())])
    }

    /// All playlist names, in stable order.
    pub fn names(&self) -> Vec<&str> {
        self.playlists.keys().map(String::as_str).collect()
    }

    /// Entries of a playlist.
    pub fn entries(&self, name: &str) -> Option<&[PlaylistEntry]> {
        self.playlists.get(name).map(Vec::as_slice)
    }

    /// Create a new empty playlist.
    pub fn create(&mut self, name: &str) -> Result<(), StoreError> {
        if self.playlists.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        self.mutate(|playlists| {
            playlists.insert(name.to_string(), Vec::new());
            Ok(())
        })
    }

    /// Delete a playlist.
    pub fn delete(&mut self, name: &str) -> Result<(), StoreError> {
        if !self.playlists.contains_key(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        self.mutate(|playlists| {
            playlists.remove(name);
            Ok(())
        })
    }

    /// Append tracks to a playlist. Duplicates are permitted. Appending an
    /// empty batch is a no-op and does not rewrite the store file.
    pub fn append(&mut self, name: &str, tracks: &[Track]) -> Result<(), StoreError> {
        if !self.playlists.contains_key(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        if tracks.is_empty() {
            return Ok(());
        }
        self.mutate(|playlists| {
            let entries = playlists
                .get_mut(name)
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
            entries.extend(tracks.iter().map(PlaylistEntry::from));
            Ok(())
        })
    }

    /// Remove every occurrence of a track from a playlist.
    pub fn remove(&mut self, name: &str, id: &TrackId) -> Result<(), StoreError> {
        if !self.playlists.contains_key(name) {
            return Err(StoreError::NotFound(name.to_string()));
        }
        self.mutate(|playlists| {
            let entries = playlists
                .get_mut(name)
                .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
            entries.retain(|e| &e.id != id);
            Ok(())
        })
    }

    /// Apply a mutation and persist the whole store. On any failure the
    /// in-memory state is rolled back to the last persisted value.
    fn mutate<F>(&mut self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, Vec<PlaylistEntry>>) -> Result<(), StoreError>,
    {
        let snapshot = self.playlists.clone();

        if let Err(err) = f(&mut self.playlists).and_then(|()| self.persist()) {
            self.playlists = snapshot;
            return Err(err);
        }
        Ok(())
    }

    /// Write the full store atomically: serialize to a sibling temp file,
    /// then rename over the target. No partial writes reach the final path.
    fn persist(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.playlists)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track(id: u64, title: &str) -> Track {
        Track {
            id: TrackId::Remote(id),
            title: title.to_string(),
            artist: String::from("artist"),
            album: String::from("album"),
            duration: Some(200),
            lyrics: None,
        }
    }

    fn store_in(dir: &Path) -> PlaylistStore {
        PlaylistStore::load(&dir.join("playlists.json")).unwrap()
    }

    #[test]
    fn fresh_store_has_default_playlist() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert_eq!(store.names(), vec!["Favorites"]);
    }

    #[test]
    fn mutations_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");

        let mut store = PlaylistStore::load(&path).unwrap();
        store.create("Road Trip").unwrap();
        store
            .append("Road Trip", &[track(1, "a"), track(2, "b")])
            .unwrap();
        store.remove("Road Trip", &TrackId::Remote(1)).unwrap();

        let reloaded = PlaylistStore::load(&path).unwrap();
        let entries = reloaded.entries("Road Trip").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "b");
    }

    #[test]
    fn empty_append_leaves_store_file_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlists.json");

        let mut store = PlaylistStore::load(&path).unwrap();
        store.append("Favorites", &[track(1, "seed")]).unwrap();
        let before = std::fs::read(&path).unwrap();
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        // Search returned nothing, nothing to add.
        store.append("Favorites", &[]).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn duplicate_tracks_are_permitted() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let t = track(7, "loop");
        store.append("Favorites", &[t.clone()]).unwrap();
        store.append("Favorites", &[t]).unwrap();
        assert_eq!(store.entries("Favorites").unwrap().len(), 2);
    }

    #[test]
    fn create_rejects_existing_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert!(matches!(
            store.create("Favorites"),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn append_to_unknown_playlist_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        assert!(matches!(
            store.append("nope", &[track(1, "a")]),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn failed_persistence_reverts_in_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append("Favorites", &[track(1, "kept")]).unwrap();

        // Point the store at an unwritable location so persist() fails.
        store.path = PathBuf::from("/nonexistent-dir/playlists.json");
        let err = store.append("Favorites", &[track(2, "lost")]);

        assert!(matches!(err, Err(StoreError::Persistence(_))));
        assert_eq!(store.entries("Favorites").unwrap().len(), 1);
        assert_eq!(store.entries("Favorites").unwrap()[0].title, "kept");
    }
}
