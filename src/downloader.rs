//! Download pipeline: resolve, stream, promote, tag, register.
//!
//! Each job is independent; the only shared resource is the destination
//! directory, where final names are claimed with exclusive file creation so
//! concurrent jobs can never race on the same path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::client::{Catalog, CatalogError, MusicDetails, Quality};
use crate::library::track::{Track, TrackId};
use crate::tagging::{self, TagFields};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("only remote tracks can be downloaded")]
    NotRemote,

    #[error("could not resolve a stream: {0}")]
    Resolution(#[source] CatalogError),

    #[error("transfer failed: {0}")]
    Transfer(#[source] CatalogError),

    #[error("download I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("download cancelled")]
    Cancelled,
}

/// Observable progress of one download job.
#[derive(Debug, Clone, Default)]
pub struct JobProgress(Arc<ProgressInner>);

#[derive(Debug, Default)]
struct ProgressInner {
    bytes: AtomicU64,
    total: AtomicU64,
}

impl JobProgress {
    pub fn bytes(&self) -> u64 {
        self.0.bytes.load(Ordering::Relaxed)
    }

    /// Total payload size; 0 when the catalog did not report one.
    pub fn total(&self) -> u64 {
        self.0.total.load(Ordering::Relaxed)
    }

    fn add(&self, n: u64) {
        self.0.bytes.fetch_add(n, Ordering::Relaxed);
    }

    fn set_total(&self, total: u64) {
        self.0.total.store(total, Ordering::Relaxed);
    }
}

/// A transient in-flight download record. Never persisted.
#[derive(Debug)]
pub struct DownloadJob {
    pub track: Track,
    pub quality: Quality,
    pub progress: JobProgress,
    pub cancel: CancellationToken,
}

impl DownloadJob {
    pub fn new(track: Track, quality: Quality) -> Self {
        Self {
            track,
            quality,
            progress: JobProgress::default(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Terminal result of a download job.
#[derive(Debug)]
pub enum DownloadOutcome {
    /// Audio written and fully tagged.
    Complete { track: Track, downgraded: bool },
    /// Audio kept, but the tag write failed.
    Partial {
        track: Track,
        downgraded: bool,
        tag_error: String,
    },
}

impl DownloadOutcome {
    pub fn track(&self) -> &Track {
        match self {
            Self::Complete { track, .. } | Self::Partial { track, .. } => track,
        }
    }

    pub fn downgraded(&self) -> bool {
        match self {
            Self::Complete { downgraded, .. } | Self::Partial { downgraded, .. } => *downgraded,
        }
    }
}

/// Orchestrates catalog calls, streaming, tagging and library registration.
pub struct DownloadPipeline<C> {
    catalog: Arc<C>,
    music_dir: PathBuf,
}

impl<C: Catalog> DownloadPipeline<C> {
    pub fn new(catalog: Arc<C>, music_dir: PathBuf) -> Self {
        Self { catalog, music_dir }
    }

    /// Run one download job to completion.
    ///
    /// The returned track is the freshly created local record; registering it
    /// with the library is the caller's final step.
    pub async fn download(
        &self,
        track: &Track,
        quality: Quality,
        progress: &JobProgress,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, DownloadError> {
        let id = track.remote_id().ok_or(DownloadError::NotRemote)?;

        // Step 1: resolve the stream, falling back one quality tier once.
        let (details, downgraded) = self.resolve(id, quality).await?;
        tracing::debug!(
            "resolved {id}: {:?} bytes at {:?} kbps",
            details.size,
            details.bitrate
        );
        if let Some(total) = details.size {
            progress.set_total(total);
        }

        tokio::fs::create_dir_all(&self.music_dir).await?;

        // Step 2: stream to a temporary file; never promote a partial write.
        let temp = self.temp_path(id);
        let streamed = self
            .stream_to_file(&details.uri, &temp, progress, cancel)
            .await;
        if let Err(err) = streamed {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err);
        }

        // Step 3: lyrics are best-effort; a failure only omits the tag.
        let lyrics = match self.catalog.lyrics(id).await {
            Ok(lyrics) => lyrics,
            Err(err) => {
                tracing::warn!("lyrics fetch failed for {id}: {err}");
                None
            }
        };
        let cover = match &details.cover {
            Some(uri) => self.fetch_cover(uri).await,
            None => None,
        };

        if cancel.is_cancelled() {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(DownloadError::Cancelled);
        }

        // Step 4: claim a destination name and promote atomically. Past this
        // point cancellation is no longer offered.
        let final_path = self.promote(&temp, track, &details.uri)?;

        // Step 5: tag; failure downgrades the job to partial success.
        let fields = TagFields {
            title: &track.title,
            artist: &track.artist,
            album: &track.album,
            cover: cover.as_deref(),
            lyrics: lyrics.as_deref(),
        };
        let tag_result = tagging::write_tags(&final_path, &fields);

        // Step 6: the new local track record for library registration.
        let local = Track {
            id: TrackId::Local(final_path),
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration: track.duration,
            lyrics,
        };

        match tag_result {
            Ok(()) => Ok(DownloadOutcome::Complete {
                track: local,
                downgraded,
            }),
            Err(err) => Ok(DownloadOutcome::Partial {
                track: local,
                downgraded,
                tag_error: err.to_string(),
            }),
        }
    }

    /// Resolve stream details, retrying exactly once at the next lower
    /// quality tier when the catalog says the requested one is unavailable.
    async fn resolve(
        &self,
        id: u64,
        quality: Quality,
    ) -> Result<(MusicDetails, bool), DownloadError> {
        match self.catalog.music_details(id, quality).await {
            Ok(details) => Ok((details, false)),
            Err(err @ CatalogError::Unavailable { .. }) => {
                let Some(lower) = quality.lower() else {
                    return Err(DownloadError::Resolution(err));
                };
                tracing::info!(
                    "{} unavailable at {}, falling back to {}",
                    id,
                    quality.label(),
                    lower.label()
                );
                match self.catalog.music_details(id, lower).await {
                    Ok(details) => Ok((details, true)),
                    Err(err) => Err(DownloadError::Resolution(err)),
                }
            }
            Err(err) => Err(DownloadError::Resolution(err)),
        }
    }

    fn temp_path(&self, id: u64) -> PathBuf {
        // Hidden so library scans never pick up a partial payload.
        let nonce: u32 = rand::random();
        self.music_dir.join(format!(".{id}-{nonce:08x}.part"))
    }

    async fn stream_to_file(
        &self,
        uri: &str,
        temp: &Path,
        progress: &JobProgress,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let mut stream = self
            .catalog
            .fetch_stream(uri)
            .await
            .map_err(DownloadError::Transfer)?;

        let mut file = tokio::fs::File::create(temp).await?;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        file.write_all(&bytes).await?;
                        progress.add(bytes.len() as u64);
                    }
                    Some(Err(err)) => return Err(DownloadError::Transfer(err)),
                    None => break,
                },
            }
        }

        file.flush().await?;
        Ok(())
    }

    async fn fetch_cover(&self, uri: &str) -> Option<Vec<u8>> {
        let mut stream = match self.catalog.fetch_stream(uri).await {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!("cover fetch failed: {err}");
                return None;
            }
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(err) => {
                    tracing::warn!("cover fetch failed: {err}");
                    return None;
                }
            }
        }
        Some(bytes)
    }

    /// Claim a collision-free destination name with exclusive creation and
    /// move the temp file over it. Exclusive creation (not check-then-create)
    /// keeps concurrent jobs from racing on the same name.
    fn promote(&self, temp: &Path, track: &Track, uri: &str) -> Result<PathBuf, DownloadError> {
        let stem = sanitize_filename(&format!("{} - {}", track.artist, track.title));
        let ext = extension_from_uri(uri);

        let mut counter = 0u32;
        loop {
            let name = if counter == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem} ({counter}).{ext}")
            };
            let candidate = self.music_dir.join(name);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(_) => {
                    std::fs::rename(temp, &candidate)?;
                    return Ok(candidate);
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    counter += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Strip characters that are illegal or awkward in filenames.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect()
}

/// Audio extension from a stream URI, defaulting to mp3.
fn extension_from_uri(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let ext = path.rsplit('/').next().and_then(|f| f.rsplit_once('.')).map(|(_, e)| e);

    match ext {
        Some(e) if !e.is_empty() && e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric()) => {
            e.to_ascii_lowercase()
        }
        _ => String::from("mp3"),
    }
}
