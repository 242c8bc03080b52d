//! External player process supervision.
//!
//! The decoder is a black-box child process (ffplay) controlled through
//! OS-level signals. Each launch hands the process handle to a dedicated
//! supervisor task; the handle never leaves that task, and everything the
//! rest of the player learns about the process arrives as [`PlayerEvent`]s.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

/// How long a graceful SIGTERM gets before the supervisor force-kills.
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no active session")]
    NoActiveSession,

    #[error("player binary unavailable: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("player process failed: {0}")]
    Process(String),

    #[error("track has no playable source")]
    NoSource,
}

/// Commands the controller can issue to a supervised child.
#[derive(Debug)]
pub enum ChildCommand {
    Pause,
    Resume,
    /// Graceful stop. Acknowledged once the process has been reaped, so a
    /// new child is never spawned while an orphan lingers.
    Terminate(oneshot::Sender<()>),
}

/// State changes reported by a supervisor task.
///
/// Every event carries the generation of the launch that produced it;
/// the controller discards events from superseded launches.
#[derive(Debug)]
pub enum PlayerEvent {
    /// The process is up and decoding.
    Started { generation: u64 },
    /// Natural completion (clean exit, not requested by us).
    Finished { generation: u64 },
    /// The process crashed or exited nonzero without being asked to stop.
    Failed { generation: u64, message: String },
}

/// Seam between the playback controller and the decoding process, so the
/// controller is testable with a fake backend.
pub trait PlayerBackend: Send + Sync + 'static {
    /// Launch playback of `uri` at `start_offset` seconds. Returns the
    /// command channel of the supervisor task that owns the process.
    fn launch(
        &self,
        uri: &str,
        start_offset: u32,
        generation: u64,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<mpsc::UnboundedSender<ChildCommand>, PlaybackError>;
}

/// Production backend: ffplay spawned per track.
#[derive(Debug, Clone)]
pub struct FfplayBackend {
    binary: String,
}

impl FfplayBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PlayerBackend for FfplayBackend {
    fn launch(
        &self,
        uri: &str,
        start_offset: u32,
        generation: u64,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<mpsc::UnboundedSender<ChildCommand>, PlaybackError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-v")
            .arg("quiet")
            .arg("-nodisp")
            .arg("-autoexit");
        if start_offset > 0 {
            command.arg("-ss").arg(start_offset.to_string());
        }
        command
            .arg(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command.spawn()?;
        tracing::debug!("spawned {} (pid {:?}) for {uri}", self.binary, child.id());

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(supervise(child, generation, command_rx, events));

        Ok(command_tx)
    }
}

/// Supervisor task: exclusive owner of one child process.
async fn supervise(
    mut child: Child,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<ChildCommand>,
    events: mpsc::UnboundedSender<PlayerEvent>,
) {
    // ffplay decodes immediately after a successful spawn; there is no
    // separate readiness signal to wait for.
    let _ = events.send(PlayerEvent::Started { generation });

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ChildCommand::Pause) => signal(&child, libc::SIGSTOP),
                Some(ChildCommand::Resume) => signal(&child, libc::SIGCONT),
                Some(ChildCommand::Terminate(ack)) => {
                    terminate(&mut child).await;
                    let _ = ack.send(());
                    return;
                }
                // Controller dropped the channel: treat as terminate.
                None => {
                    terminate(&mut child).await;
                    return;
                }
            },
            status = child.wait() => {
                let event = match status {
                    Ok(status) if status.success() => PlayerEvent::Finished { generation },
                    Ok(status) => PlayerEvent::Failed {
                        generation,
                        message: format!("player exited with {status}"),
                    },
                    Err(err) => PlayerEvent::Failed {
                        generation,
                        message: format!("wait on player failed: {err}"),
                    },
                };
                let _ = events.send(event);
                return;
            }
        }
    }
}

/// SIGTERM, bounded wait, then SIGKILL. Always reaps.
async fn terminate(child: &mut Child) {
    // A stopped process cannot handle SIGTERM; wake it first.
    signal(child, libc::SIGCONT);
    signal(child, libc::SIGTERM);

    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            tracing::warn!("player ignored SIGTERM, killing");
            let _ = child.kill().await;
        }
    }
}

fn signal(child: &Child, signal: libc::c_int) {
    if let Some(pid) = child.id() {
        // Already-exited children have no pid; nothing to signal then.
        unsafe {
            libc::kill(pid as libc::pid_t, signal);
        }
    }
}
