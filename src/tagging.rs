//! Metadata tag writing for downloaded files.
//!
//! Thin wrapper over lofty implementing the tagging contract: write title,
//! artist, album, embedded cover art and lyrics into a file. Re-tagging
//! overwrites prior values.

use std::path::Path;

use lofty::config::WriteOptions;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaggingError {
    #[error("tag write failed: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
}

/// Fields written into a file's tag.
#[derive(Debug, Default)]
pub struct TagFields<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
    pub cover: Option<&'a [u8]>,
    pub lyrics: Option<&'a str>,
}

/// Write `fields` into the file at `path`, creating a tag if none exists.
pub fn write_tags(path: &Path, fields: &TagFields) -> Result<(), TaggingError> {
    let mut tagged = Probe::open(path)?.read()?;

    let tag_type = tagged.file_type().primary_tag_type();
    if tagged.tag(tag_type).is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }

    if let Some(tag) = tagged.tag_mut(tag_type) {
        tag.set_title(fields.title.to_string());
        tag.set_artist(fields.artist.to_string());
        tag.set_album(fields.album.to_string());

        if let Some(lyrics) = fields.lyrics {
            tag.insert_text(ItemKey::Lyrics, lyrics.to_string());
        }

        if let Some(cover) = fields.cover {
            // Replace any previous front cover so re-tagging stays idempotent.
            tag.remove_picture_type(PictureType::CoverFront);
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(guess_mime(cover)),
                None,
                cover.to_vec(),
            ));
        }
    }

    tagged.save_to_path(path, WriteOptions::default())?;
    Ok(())
}

fn guess_mime(bytes: &[u8]) -> MimeType {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        MimeType::Png
    } else {
        MimeType::Jpeg
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal valid mono 8-bit PCM WAV file lofty can read and tag.
    pub(crate) fn wav_bytes() -> Vec<u8> {
        let data = [0u8; 64];
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36u32 + data.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
        out.extend_from_slice(&8000u32.to_le_bytes()); // byte rate
        out.extend_from_slice(&1u16.to_le_bytes()); // block align
        out.extend_from_slice(&8u16.to_le_bytes()); // bits per sample
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&data);
        out
    }

    #[test]
    fn writes_and_overwrites_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.wav");
        std::fs::write(&path, wav_bytes()).unwrap();

        write_tags(
            &path,
            &TagFields {
                title: "First",
                artist: "Someone",
                album: "LP",
                cover: None,
                lyrics: Some("[00:01.00]hi"),
            },
        )
        .unwrap();

        // Idempotent overwrite.
        write_tags(
            &path,
            &TagFields {
                title: "Second",
                artist: "Someone",
                album: "LP",
                cover: None,
                lyrics: None,
            },
        )
        .unwrap();

        let tagged = lofty::read_from_path(&path).unwrap();
        let tag = tagged.primary_tag().unwrap();
        assert_eq!(tag.get_string(&ItemKey::TrackTitle), Some("Second"));
        assert_eq!(tag.get_string(&ItemKey::TrackArtist), Some("Someone"));
        assert_eq!(tag.get_string(&ItemKey::Lyrics), Some("[00:01.00]hi"));
    }

    #[test]
    fn tagging_garbage_fails_without_touching_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"not audio at all").unwrap();

        let result = write_tags(
            &path,
            &TagFields {
                title: "t",
                artist: "a",
                album: "b",
                cover: None,
                lyrics: None,
            },
        );

        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"not audio at all");
    }
}
