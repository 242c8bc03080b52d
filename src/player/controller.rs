//! The playback controller: owns the single session, drives the backend.

use tokio::sync::{mpsc, oneshot};

use super::backend::{ChildCommand, PlaybackError, PlayerBackend, PlayerEvent};
use super::session::{PlayState, PlaybackMode, PlaybackSession};
use crate::library::track::Track;

/// Progress snapshot reported on each poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub elapsed: u32,
    pub duration: Option<u32>,
    pub state: PlayState,
}

/// Session-level outcome of a backend event, for the orchestrator.
#[derive(Debug)]
pub enum SessionEvent {
    /// The loading track started playing.
    Started,
    /// Natural completion; the orchestrator should advance.
    TrackEnded,
    /// The player process failed; the session is back to Idle.
    Failed(String),
}

/// Owns the [`PlaybackSession`] and the supervised player child.
///
/// One controller exists per process; it is handed to operations explicitly
/// rather than living in global state, so tests can drive it with a fake
/// backend.
pub struct PlaybackController<B: PlayerBackend> {
    backend: B,
    session: PlaybackSession,
    events_tx: mpsc::UnboundedSender<PlayerEvent>,
    events_rx: mpsc::UnboundedReceiver<PlayerEvent>,
    child: Option<mpsc::UnboundedSender<ChildCommand>>,
    /// Monotonic launch counter. Events from older generations are stale
    /// loads whose completion must be discarded, not applied.
    generation: u64,
    /// URI of the currently loaded track, kept for seek relaunches.
    current_uri: Option<String>,
    /// Set when a seek relaunch must come back up paused.
    relaunch_paused: bool,
}

impl<B: PlayerBackend> PlaybackController<B> {
    pub fn new(backend: B) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            session: PlaybackSession::default(),
            events_tx,
            events_rx,
            child: None,
            generation: 0,
            current_uri: None,
            relaunch_paused: false,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Install a new active sequence (playlist or single-track queue).
    pub fn set_queue(&mut self, tracks: Vec<Track>, start: usize) {
        self.session.set_queue(tracks, start);
    }

    pub fn cycle_mode(&mut self) -> PlaybackMode {
        self.session.cycle_mode()
    }

    /// Track under the cursor, playing or not.
    pub fn peek(&self) -> Option<Track> {
        self.session.peek().cloned()
    }

    /// Start playback of the track under the cursor from `offset` seconds.
    ///
    /// Any live child is terminated (and reaped) first, so at most one
    /// player process is ever alive.
    pub async fn play(&mut self, uri: &str, offset: u32) -> Result<(), PlaybackError> {
        self.terminate_child().await;

        self.generation += 1;
        self.relaunch_paused = false;
        self.session.begin_loading(offset);

        match self
            .backend
            .launch(uri, offset, self.generation, self.events_tx.clone())
        {
            Ok(commands) => {
                self.child = Some(commands);
                self.current_uri = Some(uri.to_string());
                Ok(())
            }
            Err(err) => {
                // Loading -> Idle on load failure.
                self.session.mark_idle();
                self.current_uri = None;
                Err(err)
            }
        }
    }

    /// Pause. Valid only from `Playing`.
    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.session.state() != PlayState::Playing {
            return Err(PlaybackError::NoActiveSession);
        }
        if let Some(child) = &self.child {
            let _ = child.send(ChildCommand::Pause);
        }
        self.session.mark_paused();
        Ok(())
    }

    /// Resume. Valid only from `Paused`.
    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.session.state() != PlayState::Paused {
            return Err(PlaybackError::NoActiveSession);
        }
        if let Some(child) = &self.child {
            let _ = child.send(ChildCommand::Resume);
        }
        self.session.mark_resumed();
        Ok(())
    }

    /// Seek by a signed delta. The backend has no native seek, so this stops
    /// the child and relaunches it with a start offset, preserving the
    /// playing/paused state across the relaunch.
    pub async fn seek(&mut self, delta: i64) -> Result<(), PlaybackError> {
        let state = self.session.state();
        if !matches!(state, PlayState::Playing | PlayState::Paused) {
            return Err(PlaybackError::NoActiveSession);
        }
        let Some(uri) = self.current_uri.clone() else {
            return Err(PlaybackError::NoSource);
        };

        let offset = self.session.clamp_seek(delta);
        self.play(&uri, offset).await?;

        if state == PlayState::Paused {
            // Keep the relaunched process stopped; the session follows once
            // the Started event arrives.
            if let Some(child) = &self.child {
                let _ = child.send(ChildCommand::Pause);
            }
            self.relaunch_paused = true;
        }
        Ok(())
    }

    /// Stop playback and clear the current track.
    pub async fn stop(&mut self) -> Result<(), PlaybackError> {
        if self.session.state() == PlayState::Idle {
            return Err(PlaybackError::NoActiveSession);
        }
        // Whatever was loading is superseded; its completion is discarded.
        self.generation += 1;
        self.terminate_child().await;
        self.session.mark_idle();
        self.current_uri = None;
        Ok(())
    }

    /// Apply the playback mode to pick the next track. `None` means the
    /// sequence is exhausted and the session has gone idle.
    pub async fn advance(&mut self) -> Option<Track> {
        match self.session.advance() {
            Some(track) => Some(track),
            None => {
                let _ = self.stop().await;
                None
            }
        }
    }

    /// Manual previous; restarts the current track at position 0.
    pub fn previous(&mut self) -> Option<Track> {
        self.session.previous()
    }

    /// Poll progress. Elapsed values are non-decreasing within a launch.
    pub fn progress(&self) -> Progress {
        Progress {
            elapsed: self.session.elapsed(),
            duration: self.session.duration(),
            state: self.session.state(),
        }
    }

    /// Drain backend events, updating the session. Stale-generation events
    /// are dropped without touching the session.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                PlayerEvent::Started { generation } if generation == self.generation => {
                    self.session.mark_playing();
                    if std::mem::take(&mut self.relaunch_paused) {
                        // Seek issued while paused: stay paused.
                        self.session.mark_paused();
                    }
                    out.push(SessionEvent::Started);
                }
                PlayerEvent::Finished { generation } if generation == self.generation => {
                    self.child = None;
                    out.push(SessionEvent::TrackEnded);
                }
                PlayerEvent::Failed {
                    generation,
                    message,
                } if generation == self.generation => {
                    self.child = None;
                    self.session.mark_idle();
                    self.current_uri = None;
                    out.push(SessionEvent::Failed(message));
                }
                stale => {
                    tracing::debug!("discarding stale player event: {stale:?}");
                }
            }
        }
        out
    }

    /// Terminate and reap the current child, if any.
    async fn terminate_child(&mut self) {
        if let Some(child) = self.child.take() {
            let (ack_tx, ack_rx) = oneshot::channel();
            if child.send(ChildCommand::Terminate(ack_tx)).is_ok() {
                let _ = ack_rx.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::track::TrackId;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records launches; each fake child acks terminate immediately.
    #[derive(Default)]
    struct FakeBackend {
        launches: AtomicU32,
        /// (uri, offset, generation) of the last launch.
        last: Mutex<Option<(String, u32, u64)>>,
        events: Mutex<Option<mpsc::UnboundedSender<PlayerEvent>>>,
        fail_spawn: bool,
    }

    impl PlayerBackend for Arc<FakeBackend> {
        fn launch(
            &self,
            uri: &str,
            start_offset: u32,
            generation: u64,
            events: mpsc::UnboundedSender<PlayerEvent>,
        ) -> Result<mpsc::UnboundedSender<ChildCommand>, PlaybackError> {
            if self.fail_spawn {
                return Err(PlaybackError::Process(String::from("missing binary")));
            }
            self.launches.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((uri.to_string(), start_offset, generation));
            *self.events.lock().unwrap() = Some(events);

            let (tx, mut rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                while let Some(cmd) = rx.recv().await {
                    if let ChildCommand::Terminate(ack) = cmd {
                        let _ = ack.send(());
                        return;
                    }
                }
            });
            Ok(tx)
        }
    }

    fn tracks(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| Track {
                id: TrackId::Local(PathBuf::from(format!("/m/{i}.mp3"))),
                title: format!("t{i}"),
                artist: String::from("a"),
                album: String::from("b"),
                duration: Some(100),
                lyrics: None,
            })
            .collect()
    }

    fn controller(backend: &Arc<FakeBackend>) -> PlaybackController<Arc<FakeBackend>> {
        PlaybackController::new(Arc::clone(backend))
    }

    impl FakeBackend {
        fn emit(&self, event: PlayerEvent) {
            self.events
                .lock()
                .unwrap()
                .as_ref()
                .expect("a launch happened")
                .send(event)
                .unwrap();
        }
        fn last_generation(&self) -> u64 {
            self.last.lock().unwrap().as_ref().unwrap().2
        }
    }

    #[tokio::test]
    async fn nothing_but_play_is_valid_from_idle() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);

        assert!(matches!(ctl.pause(), Err(PlaybackError::NoActiveSession)));
        assert!(matches!(ctl.resume(), Err(PlaybackError::NoActiveSession)));
        assert!(matches!(
            ctl.seek(5).await,
            Err(PlaybackError::NoActiveSession)
        ));
        assert!(matches!(
            ctl.stop().await,
            Err(PlaybackError::NoActiveSession)
        ));
        assert_eq!(ctl.progress().state, PlayState::Idle);
        assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn play_pause_resume_stop_replay_is_deterministic() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(1), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        assert_eq!(ctl.progress().state, PlayState::Loading);

        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();
        assert_eq!(ctl.progress().state, PlayState::Playing);

        // pause is invalid while paused, resume invalid while playing
        assert!(ctl.resume().is_err());
        ctl.pause().unwrap();
        assert_eq!(ctl.progress().state, PlayState::Paused);
        assert!(ctl.pause().is_err());

        ctl.resume().unwrap();
        assert_eq!(ctl.progress().state, PlayState::Playing);

        ctl.stop().await.unwrap();
        assert_eq!(ctl.progress().state, PlayState::Idle);
        assert!(ctl.session().current().is_none());
    }

    #[tokio::test]
    async fn load_failure_returns_to_idle() {
        let backend = Arc::new(FakeBackend {
            fail_spawn: true,
            ..FakeBackend::default()
        });
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(1), 0);

        assert!(ctl.play("/m/0.mp3", 0).await.is_err());
        assert_eq!(ctl.progress().state, PlayState::Idle);
    }

    #[tokio::test]
    async fn stale_load_completion_is_discarded() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(2), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        let first_generation = backend.last_generation();

        // Second play supersedes the first before it ever started.
        ctl.play("/m/1.mp3", 0).await.unwrap();
        let events = backend.events.lock().unwrap().clone().unwrap();

        events
            .send(PlayerEvent::Started {
                generation: first_generation,
            })
            .unwrap();
        assert!(ctl.poll_events().is_empty());
        assert_eq!(ctl.progress().state, PlayState::Loading);

        events
            .send(PlayerEvent::Started {
                generation: backend.last_generation(),
            })
            .unwrap();
        ctl.poll_events();
        assert_eq!(ctl.progress().state, PlayState::Playing);
    }

    #[tokio::test]
    async fn process_failure_surfaces_and_idles_the_session() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(1), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();

        backend.emit(PlayerEvent::Failed {
            generation: backend.last_generation(),
            message: String::from("decoder crashed"),
        });
        let events = ctl.poll_events();
        assert!(matches!(events.as_slice(), [SessionEvent::Failed(_)]));
        assert_eq!(ctl.progress().state, PlayState::Idle);
    }

    #[tokio::test]
    async fn natural_end_reports_track_ended() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(2), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        backend.emit(PlayerEvent::Finished {
            generation: backend.last_generation(),
        });

        let events = ctl.poll_events();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Started, SessionEvent::TrackEnded]
        ));

        // Sequential advance moves to the next track.
        let next = ctl.advance().await.unwrap();
        assert_eq!(next.title, "t1");
    }

    #[tokio::test]
    async fn advance_past_the_end_goes_idle() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(1), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();

        assert!(ctl.advance().await.is_none());
        assert_eq!(ctl.progress().state, PlayState::Idle);
    }

    #[tokio::test]
    async fn seek_while_paused_preserves_paused_state() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(1), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();
        ctl.pause().unwrap();

        ctl.seek(10).await.unwrap();
        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();
        assert_eq!(ctl.progress().state, PlayState::Paused);
    }

    #[tokio::test]
    async fn seek_relaunches_with_clamped_offset() {
        let backend = Arc::new(FakeBackend::default());
        let mut ctl = controller(&backend);
        ctl.set_queue(tracks(1), 0);

        ctl.play("/m/0.mp3", 0).await.unwrap();
        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();

        ctl.seek(-30).await.unwrap();
        let (uri, offset, _) = backend.last.lock().unwrap().clone().unwrap();
        assert_eq!(uri, "/m/0.mp3");
        assert_eq!(offset, 0);

        backend.emit(PlayerEvent::Started {
            generation: backend.last_generation(),
        });
        ctl.poll_events();

        ctl.seek(500).await.unwrap();
        let (_, offset, _) = backend.last.lock().unwrap().clone().unwrap();
        assert_eq!(offset, 100);
        assert_eq!(backend.launches.load(Ordering::SeqCst), 3);
    }
}
