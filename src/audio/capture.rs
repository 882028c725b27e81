//! Microphone capture through cpal.
//!
//! cpal runs one real-time callback thread per stream. The callback encodes
//! device samples straight into wire frames and hands them to the session
//! loop over a bounded channel; a full channel drops the frame so the audio
//! thread never blocks behind the network.

use anyhow::{Context, Result};
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SupportedStreamConfig};
use tokio::sync::mpsc;

use super::encoder::{PcmEncoder, TARGET_SAMPLE_RATE};

/// Capture preferences. The device keeps the final word on rate, channels
/// and format; whatever it grants is bridged to the wire format in software.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device name substring, or "default" for the system microphone.
    pub device: String,
    /// Rate to request from the device. The encoder outputs 16 kHz no
    /// matter what the device grants.
    pub target_sample_rate: u32,
    /// Preferred channel count to open.
    pub channels: u16,
    /// Ask the platform for acoustic echo cancellation.
    pub echo_cancellation: bool,
    /// Ask the platform for noise suppression.
    pub noise_suppression: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            target_sample_rate: TARGET_SAMPLE_RATE,
            channels: 1,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// A running capture stream. Dropping it stops the microphone.
pub struct CaptureHandle {
    stream: Option<cpal::Stream>,
    device_name: String,
    source_rate: u32,
    channels: u16,
}

impl CaptureHandle {
    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop the stream. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Capture pause failed: {}", e);
            }
            log::info!("Capture stopped");
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the microphone and start streaming encoded frames into `frame_tx`.
pub fn start(config: &CaptureConfig, frame_tx: mpsc::Sender<Bytes>) -> Result<CaptureHandle> {
    // 1. Find the requested input device
    let host = cpal::default_host();
    let device = find_device(&host, &config.device)?;
    let device_name = device
        .description()
        .ok()
        .map(|desc| desc.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // 2. Negotiate the stream config closest to the requested rate
    let supported = pick_config(&device, config.target_sample_rate, config.channels)?;
    let stream_config = supported.config();
    let source_rate = stream_config.sample_rate;
    let channels = stream_config.channels;

    if config.echo_cancellation || config.noise_suppression {
        // cpal exposes no processing controls; the platform mixer decides.
        log::info!(
            "Capture processing requested: aec={}, ns={}",
            config.echo_cancellation,
            config.noise_suppression,
        );
    }

    log::info!(
        "Capture starting: device \"{}\", rate {}Hz, ch {}, format {:?}",
        device_name,
        source_rate,
        channels,
        supported.sample_format(),
    );

    let encoder = PcmEncoder::new(source_rate);
    let err_fn = |e: cpal::StreamError| log::error!("Capture stream error: {}", e);

    // 3. Build the input stream for the granted sample format
    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let tx = frame_tx;
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let frame = encoder.encode(data, channels as usize);
                    if frame.is_empty() {
                        return;
                    }
                    // A full channel means the session is behind; drop the
                    // frame rather than stall the audio thread.
                    let _ = tx.try_send(frame);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let tx = frame_tx;
            let mut scratch: Vec<f32> = Vec::with_capacity(4096);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let frame = encoder.encode_i16(data, channels as usize, &mut scratch);
                    if frame.is_empty() {
                        return;
                    }
                    let _ = tx.try_send(frame);
                },
                err_fn,
                None,
            )?
        }
        other => anyhow::bail!("Unsupported capture sample format: {:?}", other),
    };

    stream.play().context("Failed to start capture stream")?;
    log::info!("Capture started");

    Ok(CaptureHandle {
        stream: Some(stream),
        device_name,
        source_rate,
        channels,
    })
}

fn find_device(host: &cpal::Host, name: &str) -> Result<Device> {
    if name == "default" {
        return host.default_input_device().context("No default input device");
    }
    for device in host
        .input_devices()
        .context("Failed to enumerate input devices")?
    {
        if let Ok(desc) = device.description() {
            if desc.name().contains(name) {
                return Ok(device);
            }
        }
    }
    log::warn!("Input device \"{}\" not found, using default", name);
    host.default_input_device().context("No input devices available")
}

/// Pick the supported config closest to the preferred rate, preferring f32
/// samples and the requested channel count. Falls back to the device
/// default when no usable range is advertised.
fn pick_config(
    device: &Device,
    preferred_rate: u32,
    preferred_channels: u16,
) -> Result<SupportedStreamConfig> {
    let ranges = match device.supported_input_configs() {
        Ok(ranges) => ranges.collect::<Vec<_>>(),
        Err(e) => {
            log::warn!("Cannot query supported configs ({}), using device default", e);
            Vec::new()
        }
    };

    let mut best: Option<(u32, SupportedStreamConfig)> = None;
    for range in ranges {
        let format = range.sample_format();
        if format != SampleFormat::F32 && format != SampleFormat::I16 {
            continue;
        }
        let rate = preferred_rate.clamp(range.min_sample_rate(), range.max_sample_rate());
        // Rate distance dominates; format and channel count break ties.
        let mut score = rate.abs_diff(preferred_rate).saturating_mul(4);
        if format != SampleFormat::F32 {
            score += 1;
        }
        if range.channels() != preferred_channels {
            score += 2;
        }
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range.with_sample_rate(rate)));
        }
    }

    match best {
        Some((_, config)) => Ok(config),
        None => device.default_input_config().context("No usable input config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();
        assert_eq!(config.device, "default");
        assert_eq!(config.channels, 1);
        assert!(config.echo_cancellation);
    }

    #[test]
    fn test_start_tolerates_missing_device() {
        // CI machines often have no microphone; either outcome must be an
        // orderly Result, not a panic.
        let (tx, _rx) = mpsc::channel(4);
        let _ = start(&CaptureConfig::default(), tx);
    }
}
