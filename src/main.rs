//! tunehub - a terminal music hub: local library, playlists, online catalog.

use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

mod action;
mod app;
mod client;
mod config;
mod downloader;
mod library;
mod lyrics;
mod player;
mod playlist;
mod tagging;
mod tui;
mod ui;

use action::{Action, InputMode};
use app::App;
use config::Config;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "tunehub")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Music directory (overrides config)
    #[arg(short, long)]
    music_dir: Option<std::path::PathBuf>,

    /// Player binary (overrides config)
    #[arg(short, long)]
    player: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install panic hooks
    tui::install_hooks()?;

    // Initialize logging
    let log_file = dirs::cache_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tunehub")
        .join("tunehub.log");

    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_subscriber::fmt::layer()
        .with_writer(std::fs::File::create(&log_file)?)
        .with_ansi(false);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::sink) // Don't write to stdout in TUI mode
        .finish()
        .with(file_appender)
        .try_init()
        .ok();

    // Parse command-line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load_from(std::path::Path::new(path)).unwrap_or_default(),
        None => Config::load().unwrap_or_default(),
    };

    // Apply command-line overrides
    if let Some(music_dir) = args.music_dir {
        config.library.music_dir = music_dir;
    }
    if let Some(player) = args.player {
        config.player.binary = player;
    }

    // Write a starter config on first run so it can be edited later
    if args.config.is_none() && !Config::config_path()?.exists() {
        config.save()?;
    }

    // Create action channel
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    // Create application
    let mut app = App::new(config, action_tx.clone())?;

    // Initialize terminal
    let mut terminal = tui::init()?;

    // Kick off the initial library scan
    app.init();

    // Main event loop
    let tick_rate = Duration::from_millis(100);

    loop {
        // Render UI
        terminal.draw(|frame| ui::render(frame, &mut app))?;

        // Handle events with timeout
        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press {
                        let action = handle_key_event(key.code, key.modifiers, &app);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
                Event::Resize(_, _) => {
                    action_tx.send(Action::Resize)?;
                }
                _ => {}
            }
        }

        // Send tick action
        action_tx.send(Action::Tick)?;

        // Process all pending actions
        while let Ok(action) = action_rx.try_recv() {
            app.handle_action(action).await?;
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    tui::restore()?;

    Ok(())
}

/// Map key events to actions.
fn handle_key_event(code: KeyCode, modifiers: KeyModifiers, app: &App) -> Action {
    // Handle text input separately
    if app.input.active {
        return handle_input_key(code);
    }

    // Global keys
    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Action::Quit,
        KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
            return Action::CancelDownload
        }
        _ => {}
    }

    match code {
        // Navigation
        KeyCode::Up | KeyCode::Char('k') => Action::NavigateUp,
        KeyCode::Down | KeyCode::Char('j') => Action::NavigateDown,
        KeyCode::Enter => Action::Select,
        KeyCode::Tab => Action::NextView,

        // Search / playlist creation
        KeyCode::Char('/') => Action::OpenInput(InputMode::LocalFilter),
        KeyCode::Char('?') => Action::OpenInput(InputMode::OnlineSearch),
        KeyCode::Char('N') => Action::OpenInput(InputMode::NewPlaylist),

        // Playback
        KeyCode::Char(' ') => Action::PlayPause,
        KeyCode::Char('s') => Action::Stop,
        KeyCode::Char('n') => Action::NextTrack,
        KeyCode::Char('p') => Action::PreviousTrack,
        KeyCode::Left | KeyCode::Char('h') => Action::SeekBackward,
        KeyCode::Right | KeyCode::Char('l') => Action::SeekForward,
        KeyCode::Char('m') => Action::CycleMode,
        KeyCode::Char('c') => Action::ToggleLyrics,

        // Library / playlists
        KeyCode::Char('d') => Action::Download,
        KeyCode::Char('x') => Action::TrashSelected,
        KeyCode::Char('a') => Action::AddToPlaylist,
        KeyCode::Char('r') => Action::RemoveFromPlaylist,
        KeyCode::Char('D') => Action::DeletePlaylist,
        KeyCode::Char('R') => Action::RescanLibrary,

        _ => Action::None,
    }
}

/// Handle key events while the input box is open.
fn handle_input_key(code: KeyCode) -> Action {
    match code {
        KeyCode::Esc => Action::CloseInput,
        KeyCode::Enter => Action::InputSubmit,
        KeyCode::Backspace => Action::InputBackspace,
        KeyCode::Char(c) => Action::InputChar(c),
        _ => Action::None,
    }
}
