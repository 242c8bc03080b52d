//! Application actions/events that drive state changes.

use crate::downloader::DownloadOutcome;
use crate::library::track::Track;
use crate::lyrics::LyricLine;

/// Where the table rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Library,
    SearchResults,
    /// A named playlist from the store.
    Playlist(String),
}

/// What the input box feeds when submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Filter the local library.
    #[default]
    LocalFilter,
    /// Query the online catalog.
    OnlineSearch,
    /// Name for a new playlist.
    NewPlaylist,
}

/// Actions dispatched to update application state.
#[derive(Debug)]
pub enum Action {
    // Application lifecycle
    Quit,
    Tick,
    Resize,

    // Navigation
    NavigateUp,
    NavigateDown,
    Select,
    NextView,

    // Input box (search / playlist name)
    OpenInput(InputMode),
    CloseInput,
    InputChar(char),
    InputBackspace,
    InputSubmit,

    // Playback controls
    PlayPause,
    Stop,
    NextTrack,
    PreviousTrack,
    SeekForward,
    SeekBackward,
    CycleMode,
    ToggleLyrics,

    // Library / playlists
    Download,
    CancelDownload,
    TrashSelected,
    AddToPlaylist,
    RemoveFromPlaylist,
    DeletePlaylist,
    RescanLibrary,

    // Results of background work
    SearchLoaded(Vec<Track>),
    LibraryScanned(Vec<Track>),
    /// A remote track's stream URI resolved for playback. `epoch` ties the
    /// resolution to the play request that asked for it; stale resolutions
    /// are discarded.
    PlaybackResolved {
        epoch: u64,
        uri: String,
        offset: u32,
    },
    LyricsLoaded(Vec<LyricLine>),
    DownloadFinished {
        id: u64,
        outcome: Result<Box<DownloadOutcome>, String>,
    },

    // Status line
    Error(String),

    // No-op
    None,
}
