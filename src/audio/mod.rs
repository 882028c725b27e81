//! audio - Microphone capture, wire encoding, and agent speech playback
//!
//! Capture and playback each run on their own real-time thread (cpal's
//! callback thread and a rodio worker); the session loop talks to both
//! only through channels, never by sharing buffers.

pub mod capture;
mod encoder;
mod payload;
pub mod playback;

pub use capture::{CaptureConfig, CaptureHandle};
pub use playback::{Player, PlayerCommand, PlayerEvent, PlayerSettings};
