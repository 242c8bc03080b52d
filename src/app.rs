//! Main application state and logic: wires user input to the playback
//! controller, download pipeline and playlist store, and renders their state.

use std::sync::Arc;

use color_eyre::Result;
use tokio::sync::mpsc;

use crate::action::{Action, InputMode, View};
use crate::client::{Catalog, CatalogClient};
use crate::config::Config;
use crate::downloader::{DownloadJob, DownloadOutcome, DownloadPipeline, JobProgress};
use crate::library::{
    self,
    track::{Track, TrackId},
};
use crate::lyrics::{self, LyricLine};
use crate::player::{
    FfplayBackend, PlayState, PlaybackController, Progress, SessionEvent,
};
use crate::playlist::PlaylistStore;

/// Input box state (library filter, online search, playlist name).
#[derive(Debug, Default)]
pub struct InputState {
    pub active: bool,
    pub mode: InputMode,
    pub query: String,
}

/// An in-flight download, kept for progress rendering and cancellation.
pub struct ActiveDownload {
    pub id: u64,
    pub track_id: TrackId,
    pub title: String,
    pub progress: JobProgress,
    pub cancel: tokio_util::sync::CancellationToken,
}

/// Main application state.
pub struct App {
    /// Whether the app should quit
    pub should_quit: bool,

    /// Configuration
    pub config: Config,

    /// Catalog client shared with background tasks
    catalog: Arc<CatalogClient>,

    /// Download pipeline
    pipeline: Arc<DownloadPipeline<CatalogClient>>,

    /// Playback controller (single session)
    pub controller: PlaybackController<FfplayBackend>,

    /// Playlist store
    pub store: PlaylistStore,

    /// Scanned local library
    pub library: Vec<Track>,

    /// Current view and its table rows
    pub view: View,
    pub rows: Vec<Track>,
    pub selected: usize,

    /// Input box
    pub input: InputState,

    /// Current track lyrics, parsed
    pub lyrics: Vec<LyricLine>,
    pub lyrics_visible: bool,

    /// Active downloads
    pub downloads: Vec<ActiveDownload>,

    /// Status/error line
    pub status: Option<String>,

    /// Last polled playback progress
    pub progress: Progress,

    /// Action sender for background tasks
    action_tx: mpsc::UnboundedSender<Action>,

    /// Ties async stream resolutions to the play request that asked
    resolve_epoch: u64,

    /// A remote stream resolution is still in flight
    resolving: bool,

    /// Download job id counter
    next_download_id: u64,
}

impl App {
    /// Create a new application instance.
    pub fn new(config: Config, action_tx: mpsc::UnboundedSender<Action>) -> Result<Self> {
        let catalog = Arc::new(CatalogClient::new(&config.catalog));
        let pipeline = Arc::new(DownloadPipeline::new(
            Arc::clone(&catalog),
            config.library.music_dir.clone(),
        ));
        let controller = PlaybackController::new(FfplayBackend::new(config.player.binary.as_str()));
        let store = PlaylistStore::load(&config.library.playlists_file)?;

        Ok(Self {
            should_quit: false,
            catalog,
            pipeline,
            controller,
            store,
            library: Vec::new(),
            view: View::Library,
            rows: Vec::new(),
            selected: 0,
            input: InputState::default(),
            lyrics: Vec::new(),
            lyrics_visible: true,
            downloads: Vec::new(),
            status: None,
            progress: Progress {
                elapsed: 0,
                duration: None,
                state: PlayState::Idle,
            },
            action_tx,
            resolve_epoch: 0,
            resolving: false,
            next_download_id: 0,
            config,
        })
    }

    /// Kick off the initial library scan.
    pub fn init(&mut self) {
        self.spawn_scan();
    }

    /// Dispatch one action.
    pub async fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.resolve_epoch += 1;
                let _ = self.controller.stop().await;
                self.should_quit = true;
            }
            Action::Tick => self.on_tick().await,
            Action::Resize | Action::None => {}

            Action::NavigateUp => {
                self.selected = self.selected.saturating_sub(1);
            }
            Action::NavigateDown => {
                if !self.rows.is_empty() {
                    self.selected = (self.selected + 1).min(self.rows.len() - 1);
                }
            }
            Action::Select => self.play_selected().await,
            Action::NextView => self.next_view(),

            Action::OpenInput(mode) => {
                self.input.active = true;
                self.input.mode = mode;
                self.input.query.clear();
            }
            Action::CloseInput => {
                self.input.active = false;
                if self.view == View::Library {
                    self.rows = self.library.clone();
                    self.selected = 0;
                }
            }
            Action::InputChar(c) => self.input.query.push(c),
            Action::InputBackspace => {
                self.input.query.pop();
            }
            Action::InputSubmit => self.submit_input(),

            Action::PlayPause => self.toggle_pause(),
            Action::Stop => {
                // Invalidate any stream resolution still in flight, so a
                // resolution landing after the stop is discarded.
                self.resolve_epoch += 1;
                let was_resolving = std::mem::take(&mut self.resolving);
                if let Err(err) = self.controller.stop().await {
                    // Stopping while a stream was still resolving is a
                    // successful cancel, not a missing session.
                    if !was_resolving {
                        self.status = Some(err.to_string());
                    }
                }
            }
            Action::NextTrack => {
                match self.controller.advance().await {
                    Some(track) => self.start_track(track).await,
                    None => self.status = Some(String::from("end of queue")),
                }
            }
            Action::PreviousTrack => {
                match self.controller.previous() {
                    Some(track) => self.start_track(track).await,
                    None => self.status = Some(String::from("no active session")),
                }
            }
            Action::SeekForward => self.seek(self.config.player.seek_seconds as i64).await,
            Action::SeekBackward => self.seek(-(self.config.player.seek_seconds as i64)).await,
            Action::CycleMode => {
                let mode = self.controller.cycle_mode();
                self.status = Some(format!("mode: {:?}", mode));
            }
            Action::ToggleLyrics => self.lyrics_visible = !self.lyrics_visible,

            Action::Download => self.download_selected(),
            Action::CancelDownload => self.cancel_download(),
            Action::TrashSelected => self.trash_selected(),
            Action::AddToPlaylist => self.add_selected_to_playlist(),
            Action::RemoveFromPlaylist => self.remove_selected_from_playlist(),
            Action::DeletePlaylist => self.delete_current_playlist(),
            Action::RescanLibrary => self.spawn_scan(),

            Action::SearchLoaded(tracks) => {
                self.status = Some(format!("{} result(s)", tracks.len()));
                self.view = View::SearchResults;
                self.rows = tracks;
                self.selected = 0;
            }
            Action::LibraryScanned(tracks) => {
                self.library = tracks;
                if self.view == View::Library {
                    self.rows = self.library.clone();
                    self.selected = self.selected.min(self.rows.len().saturating_sub(1));
                }
            }
            Action::PlaybackResolved { epoch, uri, offset } => {
                // A newer play/stop superseded this resolution; discard it.
                if epoch == self.resolve_epoch {
                    self.resolving = false;
                    if let Err(err) = self.controller.play(&uri, offset).await {
                        self.status = Some(err.to_string());
                    }
                }
            }
            Action::LyricsLoaded(lines) => self.lyrics = lines,
            Action::DownloadFinished { id, outcome } => self.finish_download(id, outcome),

            Action::Error(message) => self.status = Some(message),
        }
        Ok(())
    }

    /// Per-tick work: drain backend events, refresh the progress snapshot.
    async fn on_tick(&mut self) {
        for event in self.controller.poll_events() {
            match event {
                SessionEvent::Started => {}
                SessionEvent::TrackEnded => match self.controller.advance().await {
                    Some(track) => self.start_track(track).await,
                    None => self.status = Some(String::from("end of queue")),
                },
                SessionEvent::Failed(message) => {
                    self.status = Some(format!("playback failed: {message}"));
                }
            }
        }
        self.progress = self.controller.progress();
    }

    /// Play the selected row, making the current view the active queue.
    async fn play_selected(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        self.controller.set_queue(self.rows.clone(), self.selected);
        if let Some(track) = self.controller.peek() {
            self.start_track(track).await;
        }
    }

    /// Launch playback of a track the cursor already points at.
    async fn start_track(&mut self, track: Track) {
        self.resolve_epoch += 1;
        self.resolving = false;
        self.lyrics.clear();

        match &track.id {
            TrackId::Local(_) => {
                if let Some(text) = &track.lyrics {
                    self.lyrics = lyrics::parse_lrc(text);
                }
                if let Some(uri) = track.playback_uri() {
                    if let Err(err) = self.controller.play(&uri, 0).await {
                        self.status = Some(err.to_string());
                    }
                }
            }
            TrackId::Remote(id) => {
                let id = *id;
                self.resolving = true;
                let epoch = self.resolve_epoch;
                let quality = self.config.catalog.play_quality;
                let catalog = Arc::clone(&self.catalog);
                let tx = self.action_tx.clone();

                tokio::spawn(async move {
                    match catalog.music_details(id, quality).await {
                        Ok(details) => {
                            let _ = tx.send(Action::PlaybackResolved {
                                epoch,
                                uri: details.uri,
                                offset: 0,
                            });
                        }
                        Err(err) => {
                            let _ = tx.send(Action::Error(format!("cannot stream: {err}")));
                        }
                    }
                });

                let catalog = Arc::clone(&self.catalog);
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    if let Ok(Some(text)) = catalog.lyrics(id).await {
                        let _ = tx.send(Action::LyricsLoaded(lyrics::parse_lrc(&text)));
                    }
                });
            }
        }
    }

    fn toggle_pause(&mut self) {
        let result = match self.progress.state {
            PlayState::Playing => self.controller.pause(),
            PlayState::Paused => self.controller.resume(),
            PlayState::Idle | PlayState::Loading => {
                self.status = Some(String::from("no active session"));
                return;
            }
        };
        if let Err(err) = result {
            self.status = Some(err.to_string());
        }
    }

    async fn seek(&mut self, delta: i64) {
        if let Err(err) = self.controller.seek(delta).await {
            self.status = Some(err.to_string());
        }
    }

    fn submit_input(&mut self) {
        self.input.active = false;
        let query = self.input.query.trim().to_string();
        if query.is_empty() {
            return;
        }

        match self.input.mode {
            InputMode::LocalFilter => {
                let needle = query.to_lowercase();
                self.view = View::Library;
                self.rows = self
                    .library
                    .iter()
                    .filter(|t| {
                        t.title.to_lowercase().contains(&needle)
                            || t.artist.to_lowercase().contains(&needle)
                    })
                    .cloned()
                    .collect();
                self.selected = 0;
            }
            InputMode::OnlineSearch => {
                let catalog = Arc::clone(&self.catalog);
                let tx = self.action_tx.clone();
                tokio::spawn(async move {
                    match catalog.search(&query, 1, 30).await {
                        Ok(tracks) => {
                            let _ = tx.send(Action::SearchLoaded(tracks));
                        }
                        Err(err) => {
                            let _ = tx.send(Action::Error(format!("search failed: {err}")));
                        }
                    }
                });
                self.status = Some(String::from("searching..."));
            }
            InputMode::NewPlaylist => match self.store.create(&query) {
                Ok(()) => {
                    self.status = Some(format!("created playlist '{query}'"));
                    self.view = View::Playlist(query);
                    self.rows = Vec::new();
                    self.selected = 0;
                }
                Err(err) => self.status = Some(err.to_string()),
            },
        }
    }

    /// Delete the playlist being viewed and fall back to the library view.
    fn delete_current_playlist(&mut self) {
        let View::Playlist(name) = self.view.clone() else {
            self.status = Some(String::from("not viewing a playlist"));
            return;
        };
        match self.store.delete(&name) {
            Ok(()) => {
                self.status = Some(format!("deleted playlist '{name}'"));
                self.view = View::Library;
                self.rows = self.library.clone();
                self.selected = 0;
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    /// Cycle Library -> each playlist -> Library.
    fn next_view(&mut self) {
        let names: Vec<String> = self.store.names().iter().map(|s| s.to_string()).collect();

        self.view = match &self.view {
            View::Library | View::SearchResults => match names.first() {
                Some(first) => View::Playlist(first.clone()),
                None => View::Library,
            },
            View::Playlist(current) => {
                let next = names
                    .iter()
                    .position(|n| n == current)
                    .and_then(|i| names.get(i + 1));
                match next {
                    Some(name) => View::Playlist(name.clone()),
                    None => View::Library,
                }
            }
        };

        self.rows = match &self.view {
            View::Library => self.library.clone(),
            View::Playlist(name) => self
                .store
                .entries(name)
                .map(|entries| entries.iter().map(|e| e.to_track()).collect())
                .unwrap_or_default(),
            View::SearchResults => Vec::new(),
        };
        self.selected = 0;
    }

    fn download_selected(&mut self) {
        let Some(track) = self.rows.get(self.selected).cloned() else {
            return;
        };
        if track.is_local() {
            self.status = Some(String::from("already in the library"));
            return;
        }

        self.next_download_id += 1;
        let id = self.next_download_id;
        let job = DownloadJob::new(track.clone(), self.config.catalog.download_quality);
        self.downloads.push(ActiveDownload {
            id,
            track_id: track.id.clone(),
            title: track.title.clone(),
            progress: job.progress.clone(),
            cancel: job.cancel.clone(),
        });

        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let outcome = pipeline
                .download(&job.track, job.quality, &job.progress, &job.cancel)
                .await;
            let outcome = outcome.map(Box::new).map_err(|e| e.to_string());
            let _ = tx.send(Action::DownloadFinished { id, outcome });
        });
        self.status = Some(format!("downloading '{}'", track.title));
    }

    /// Cancel the download of the selected track, or the most recently
    /// started one when the selection has no download in flight.
    fn cancel_download(&mut self) {
        let selected_id = self.rows.get(self.selected).map(|t| t.id.clone());
        let download = self
            .downloads
            .iter()
            .find(|d| Some(&d.track_id) == selected_id.as_ref())
            .or_else(|| self.downloads.last());
        if let Some(download) = download {
            download.cancel.cancel();
            self.status = Some(format!("cancelling '{}'", download.title));
        }
    }

    fn finish_download(&mut self, id: u64, outcome: Result<Box<DownloadOutcome>, String>) {
        self.downloads.retain(|d| d.id != id);

        match outcome {
            Ok(outcome) => {
                let downgraded = if outcome.downgraded() {
                    " (quality downgraded)"
                } else {
                    ""
                };
                self.status = Some(match &*outcome {
                    DownloadOutcome::Complete { track, .. } => {
                        format!("downloaded '{}'{downgraded}", track.title)
                    }
                    DownloadOutcome::Partial {
                        track, tag_error, ..
                    } => {
                        format!(
                            "downloaded '{}' but tagging failed: {tag_error}{downgraded}",
                            track.title
                        )
                    }
                });
                // Register the new local track with the library.
                self.library.push(outcome.track().clone());
                self.library
                    .sort_by(|a, b| a.local_path().cmp(&b.local_path()));
                if self.view == View::Library {
                    self.rows = self.library.clone();
                }
            }
            Err(message) => {
                self.status = Some(format!("download failed: {message}"));
            }
        }
    }

    fn trash_selected(&mut self) {
        let Some(track) = self.rows.get(self.selected) else {
            return;
        };
        let Some(path) = track.local_path().map(|p| p.to_path_buf()) else {
            self.status = Some(String::from("only local tracks can be deleted"));
            return;
        };

        match library::trash(&path, &self.config.library.trash_dir) {
            Ok(target) => {
                self.status = Some(format!("moved to trash: {}", target.display()));
                self.library.retain(|t| t.local_path() != Some(path.as_path()));
                self.rows.remove(self.selected);
                self.selected = self.selected.min(self.rows.len().saturating_sub(1));
            }
            Err(err) => self.status = Some(format!("delete failed: {err}")),
        }
    }

    fn add_selected_to_playlist(&mut self) {
        let Some(track) = self.rows.get(self.selected).cloned() else {
            return;
        };
        let name = match &self.view {
            View::Playlist(name) => name.clone(),
            _ => String::from("Favorites"),
        };
        if self.store.entries(&name).is_none() {
            if let Err(err) = self.store.create(&name) {
                self.status = Some(err.to_string());
                return;
            }
        }

        match self.store.append(&name, std::slice::from_ref(&track)) {
            Ok(()) => self.status = Some(format!("added '{}' to {name}", track.title)),
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn remove_selected_from_playlist(&mut self) {
        let View::Playlist(name) = self.view.clone() else {
            self.status = Some(String::from("not viewing a playlist"));
            return;
        };
        let Some(id) = self.rows.get(self.selected).map(|t| t.id.clone()) else {
            return;
        };

        match self.store.remove(&name, &id) {
            Ok(()) => {
                self.rows = self
                    .store
                    .entries(&name)
                    .map(|entries| entries.iter().map(|e| e.to_track()).collect())
                    .unwrap_or_default();
                self.selected = self.selected.min(self.rows.len().saturating_sub(1));
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn spawn_scan(&self) {
        let dir = self.config.library.music_dir.clone();
        let tx = self.action_tx.clone();
        tokio::task::spawn_blocking(move || {
            let tracks = library::scan(&dir);
            let _ = tx.send(Action::LibraryScanned(tracks));
        });
    }
}
