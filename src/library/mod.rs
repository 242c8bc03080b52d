//! Local audio library: scanning and recoverable deletion.

pub mod track;

use std::path::{Path, PathBuf};

use lofty::prelude::*;
use lofty::tag::ItemKey;
use thiserror::Error;
use walkdir::WalkDir;

use track::{Track, TrackId};

/// Extensions the scanner recognizes as audio files.
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "wav"];

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|s| *s == ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Scan a directory tree for audio files.
///
/// Idempotent: scanning an unchanged directory yields an identical track set
/// (tracks are keyed by path and sorted), and files removed since the last
/// scan simply no longer appear.
pub fn scan(dir: &Path) -> Vec<Track> {
    let mut tracks: Vec<Track> = Vec::new();

    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.is_file() && is_audio_file(path) {
            tracks.push(read_track(path));
        }
    }

    tracks.sort_by(|a, b| a.local_path().cmp(&b.local_path()));
    tracks
}

/// Build a `Track` from a file, falling back to the file stem when the file
/// is untagged or unreadable.
fn read_track(path: &Path) -> Track {
    let mut title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string();
    let mut artist = String::from("Unknown");
    let mut album = String::from("Unknown");
    let mut duration = None;
    let mut lyrics = None;

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            duration = Some(tagged.properties().duration().as_secs() as u32);

            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(v) = tag.get_string(&ItemKey::TrackTitle) {
                    if !v.trim().is_empty() {
                        title = v.trim().to_string();
                    }
                }
                if let Some(v) = tag.get_string(&ItemKey::TrackArtist) {
                    if !v.trim().is_empty() {
                        artist = v.trim().to_string();
                    }
                }
                if let Some(v) = tag.get_string(&ItemKey::AlbumTitle) {
                    if !v.trim().is_empty() {
                        album = v.trim().to_string();
                    }
                }
                lyrics = tag
                    .get_string(&ItemKey::Lyrics)
                    .filter(|v| !v.is_empty())
                    .map(String::from);
            }
        }
        Err(err) => {
            tracing::debug!("unreadable tags in {}: {err}", path.display());
        }
    }

    Track {
        id: TrackId::Local(path.to_path_buf()),
        title,
        artist,
        album,
        duration,
        lyrics,
    }
}

/// Move a local file into the trash directory instead of unlinking it.
///
/// Returns the file's new location. Name collisions in the trash get a
/// numeric suffix.
pub fn trash(file: &Path, trash_dir: &Path) -> Result<PathBuf, LibraryError> {
    std::fs::create_dir_all(trash_dir)?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("untitled"));

    let mut target = trash_dir.join(&name);
    let mut counter = 1u32;
    while target.exists() {
        target = trash_dir.join(format!("{name}.{counter}"));
        counter += 1;
    }

    // rename() fails across filesystems; fall back to copy + remove.
    if std::fs::rename(file, &target).is_err() {
        std::fs::copy(file, &target)?;
        std::fs::remove_file(file)?;
    }

    tracing::info!("trashed {} -> {}", file.display(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn rescanning_unchanged_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        // Not decodable audio, but enough for path/extension enumeration;
        // tag reading falls back to the file stem.
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::write(dir.path().join("b.flac"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let first = scan(dir.path());
        let second = scan(dir.path());

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn removed_files_drop_out_of_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"x").unwrap();
        fs::write(dir.path().join("b.mp3"), b"x").unwrap();

        assert_eq!(scan(dir.path()).len(), 2);

        fs::remove_file(dir.path().join("b.mp3")).unwrap();
        let after = scan(dir.path());
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].title, "a");
    }

    #[test]
    fn untagged_file_uses_stem_as_title() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("My Song.mp3"), b"x").unwrap();

        let tracks = scan(dir.path());
        assert_eq!(tracks[0].title, "My Song");
        assert_eq!(tracks[0].artist, "Unknown");
    }

    #[test]
    fn hidden_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".hidden.mp3"), b"x").unwrap();
        assert!(scan(dir.path()).is_empty());
    }

    #[test]
    fn trash_moves_file_and_suffixes_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let trash_dir = dir.path().join("trash");

        let file = dir.path().join("song.mp3");
        fs::write(&file, b"one").unwrap();
        let first = trash(&file, &trash_dir).unwrap();
        assert!(!file.exists());
        assert_eq!(first, trash_dir.join("song.mp3"));

        fs::write(&file, b"two").unwrap();
        let second = trash(&file, &trash_dir).unwrap();
        assert_eq!(second, trash_dir.join("song.mp3.1"));
        assert_eq!(fs::read(&second).unwrap(), b"two");
    }
}
