//! Agent speech playback on a dedicated worker thread.
//!
//! rodio owns the output device. The worker holds the output stream and at
//! most one Sink at a time: a new payload always stops and replaces the
//! clip still playing. Lifecycle events flow back to the session loop so
//! session state stays in step with the speaker.

use std::io::Cursor;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Result};
use rodio::{Decoder, OutputStreamBuilder, Sink};
use tokio::sync::mpsc as async_mpsc;

use super::payload;

/// Playback tuning, fixed at session start.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// MIME assumed when the server does not send one.
    pub default_mime: String,
    /// Rate used when a raw PCM payload has no rate token, and for the
    /// forced-PCM retry after a failed decode.
    pub fallback_sample_rate: u32,
    /// Initial sink volume, 0.0 to 1.0.
    pub volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            default_mime: "audio/mpeg".to_string(),
            fallback_sample_rate: 24_000,
            volume: 0.8,
        }
    }
}

/// Commands accepted by the worker.
#[derive(Debug)]
pub enum PlayerCommand {
    /// Decode one agent payload and play it, replacing the current clip.
    Play { data: Vec<u8>, mime: Option<String> },
    /// Stop the current clip, if any.
    Stop,
    /// Change the sink volume, clamped to 0.0..=1.0.
    SetVolume(f32),
    /// Stop and exit the worker.
    Shutdown,
}

/// Lifecycle notifications from the worker.
#[derive(Debug)]
pub enum PlayerEvent {
    Started,
    Finished,
    Failed(String),
}

/// Handle owned by the session side. Commands sent after the worker has
/// exited are dropped, so a machine without an output device just runs
/// the session without agent audio.
pub struct Player {
    cmd_tx: mpsc::Sender<PlayerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Player {
    /// Spawn the worker thread. The output device is opened on the worker,
    /// so a missing device surfaces as a log line, not a startup failure.
    pub fn start(
        settings: PlayerSettings,
        event_tx: async_mpsc::Sender<PlayerEvent>,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("audio-play".into())
            .spawn(move || {
                if let Err(e) = player_thread(cmd_rx, event_tx, settings) {
                    log::error!("Playback thread error: {}", e);
                }
            })?;
        Ok(Self {
            cmd_tx,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> mpsc::Sender<PlayerCommand> {
        self.cmd_tx.clone()
    }

    /// Stop the worker and wait for it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(PlayerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ======================== Worker thread ========================

fn player_thread(
    cmd_rx: mpsc::Receiver<PlayerCommand>,
    event_tx: async_mpsc::Sender<PlayerEvent>,
    settings: PlayerSettings,
) -> Result<()> {
    let stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| anyhow!("Failed to open audio output: {}", e))?;
    let mixer = stream.mixer();

    let mut volume = settings.volume.clamp(0.0, 1.0);
    let mut current: Option<Sink> = None;

    log::info!(
        "Playback ready: default_mime={}, fallback_rate={}Hz, volume={}",
        settings.default_mime,
        settings.fallback_sample_rate,
        volume,
    );

    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(PlayerCommand::Play { data, mime }) => {
                // The previous clip is stopped and released before the new
                // one starts; there is never more than one sink alive.
                if let Some(sink) = current.take() {
                    sink.stop();
                }
                match play_payload(&mixer, &data, mime.as_deref(), &settings, volume) {
                    Ok(sink) => {
                        current = Some(sink);
                        let _ = event_tx.try_send(PlayerEvent::Started);
                    }
                    Err(e) => {
                        log::error!("Agent audio unplayable: {}", e);
                        let _ = event_tx.try_send(PlayerEvent::Failed(e.to_string()));
                    }
                }
            }
            Ok(PlayerCommand::Stop) => {
                if let Some(sink) = current.take() {
                    sink.stop();
                    let _ = event_tx.try_send(PlayerEvent::Finished);
                }
            }
            Ok(PlayerCommand::SetVolume(v)) => {
                volume = v.clamp(0.0, 1.0);
                if let Some(sink) = &current {
                    sink.set_volume(volume);
                }
            }
            Ok(PlayerCommand::Shutdown) => {
                if let Some(sink) = current.take() {
                    sink.stop();
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                // Poll for completion; an empty sink means the clip ended.
                if current.as_ref().is_some_and(|s| s.empty()) {
                    current = None;
                    let _ = event_tx.try_send(PlayerEvent::Finished);
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    log::info!("Playback stopped");
    Ok(())
}

/// Decode one payload and start it on a fresh sink. If the sniffed
/// container fails to open, the raw payload bytes are rewrapped as
/// fallback-rate mono PCM and retried exactly once.
fn play_payload(
    mixer: &rodio::mixer::Mixer,
    data: &[u8],
    mime: Option<&str>,
    settings: &PlayerSettings,
    volume: f32,
) -> Result<Sink> {
    let clip = payload::build_clip(
        mime,
        data.to_vec(),
        &settings.default_mime,
        settings.fallback_sample_rate,
    );
    log::debug!("Agent clip: {} bytes as {}", clip.data.len(), clip.mime);

    match start_sink(mixer, clip.data, volume) {
        Ok(sink) => Ok(sink),
        Err(first) => {
            log::warn!(
                "Clip decode failed ({}), retrying as {}Hz mono PCM",
                first,
                settings.fallback_sample_rate,
            );
            let rewrapped = payload::wrap_pcm_in_wav(data, settings.fallback_sample_rate, 1);
            start_sink(mixer, rewrapped, volume)
                .map_err(|second| anyhow!("PCM fallback failed: {}", second))
        }
    }
}

fn start_sink(
    mixer: &rodio::mixer::Mixer,
    bytes: Vec<u8>,
    volume: f32,
) -> Result<Sink, rodio::decoder::DecoderError> {
    let source = Decoder::new(Cursor::new(bytes))?;
    let sink = Sink::connect_new(mixer);
    sink.set_volume(volume);
    sink.append(source);
    sink.play();
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::payload::wrap_pcm_in_wav;

    fn open_decoder(
        bytes: Vec<u8>,
    ) -> Result<Decoder<Cursor<Vec<u8>>>, rodio::decoder::DecoderError> {
        Decoder::new(Cursor::new(bytes))
    }

    #[test]
    fn test_settings_default() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.default_mime, "audio/mpeg");
        assert_eq!(settings.fallback_sample_rate, 24_000);
        assert!((settings.volume - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_pcm_rewrap_recovers_undecodable_payload() {
        // Raw TTS PCM has no container magic, so the first decode attempt
        // fails; the same bytes wrapped as WAV must decode.
        let pcm: Vec<u8> = (0..4096u32).map(|i| (i * 37 % 251) as u8).collect();
        assert!(open_decoder(pcm.clone()).is_err());

        let rewrapped = wrap_pcm_in_wav(&pcm, 24_000, 1);
        let decoder = open_decoder(rewrapped).expect("rewrapped PCM must decode");
        assert_eq!(decoder.count(), 2048); // 4096 bytes of 16-bit mono
    }

    #[test]
    fn test_synthesized_clip_decodes() {
        let pcm = vec![0u8; 640];
        let clip = payload::build_clip(
            Some("audio/L16;codec=pcm;rate=16000"),
            pcm,
            "audio/mpeg",
            24_000,
        );
        assert_eq!(clip.mime, "audio/wav");
        let decoder = open_decoder(clip.data).expect("synthesized WAV must decode");
        assert_eq!(decoder.count(), 320);
    }

    #[test]
    fn test_player_shutdown_is_idempotent() {
        let (event_tx, _event_rx) = async_mpsc::channel(8);
        let mut player = Player::start(PlayerSettings::default(), event_tx).unwrap();
        let sender = player.sender();
        let _ = sender.send(PlayerCommand::Play {
            data: vec![1, 2, 3],
            mime: None,
        });
        player.shutdown();
        player.shutdown();
        // Commands after shutdown are dropped, not a panic.
        let _ = sender.send(PlayerCommand::Stop);
    }
}
