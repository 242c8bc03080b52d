//! Playback: session state machine, process backend, controller.

pub mod backend;
pub mod controller;
pub mod session;

pub use backend::FfplayBackend;
pub use controller::{PlaybackController, Progress, SessionEvent};
pub use session::PlayState;
