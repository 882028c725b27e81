//! Wire-format encoder: device samples → 16 kHz mono PCM16 frames.
//!
//! Runs inside the capture callback, so it must stay allocation-light and
//! never block. Each call produces one finished binary frame ready to send.

use bytes::Bytes;

/// Sample rate of every frame leaving the encoder.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Stateless per-stream encoder. The resample ratio is fixed when the
/// capture stream opens and never changes afterwards.
#[derive(Debug, Clone, Copy)]
pub struct PcmEncoder {
    source_rate: u32,
    /// source_rate / 16000. 1.0 means pass-through.
    factor: f64,
}

impl PcmEncoder {
    pub fn new(source_rate: u32) -> Self {
        Self {
            source_rate,
            factor: source_rate as f64 / TARGET_SAMPLE_RATE as f64,
        }
    }

    /// Encode one callback's worth of interleaved f32 samples.
    ///
    /// Only channel 0 is consumed; other channels are skipped, not averaged.
    /// At the native rate samples pass straight to quantization, otherwise
    /// they go through linear interpolation first. The output length is
    /// floor(input_frames / factor); an empty input yields an empty frame.
    pub fn encode(&self, interleaved: &[f32], channels: usize) -> Bytes {
        let channels = channels.max(1);
        let in_len = interleaved.len() / channels;
        if in_len == 0 {
            return Bytes::new();
        }

        let mono = |i: usize| interleaved[i * channels];

        if self.source_rate == TARGET_SAMPLE_RATE {
            let mut frame = Vec::with_capacity(in_len * 2);
            for i in 0..in_len {
                frame.extend_from_slice(&quantize(mono(i)).to_le_bytes());
            }
            return frame.into();
        }

        let out_len = (in_len as f64 / self.factor) as usize;
        let mut frame = Vec::with_capacity(out_len * 2);
        for i in 0..out_len {
            let pos = i as f64 * self.factor;
            let idx = (pos as usize).min(in_len - 1);
            let frac = pos - idx as f64;
            let a = mono(idx);
            // At the right edge the second tap clamps to the last sample.
            let b = if idx + 1 < in_len { mono(idx + 1) } else { a };
            let sample = (a as f64 + (b as f64 - a as f64) * frac) as f32;
            frame.extend_from_slice(&quantize(sample).to_le_bytes());
        }
        frame.into()
    }

    /// Same as [`encode`](Self::encode) for devices that only open in i16.
    /// `scratch` is reused across callbacks so the hot path does not
    /// reallocate once it has grown to one period.
    pub fn encode_i16(&self, interleaved: &[i16], channels: usize, scratch: &mut Vec<f32>) -> Bytes {
        let channels = channels.max(1);
        scratch.clear();
        scratch.extend(
            interleaved
                .iter()
                .step_by(channels)
                .map(|&s| s as f32 / 32768.0),
        );
        self.encode(scratch, 1)
    }
}

/// Quantize one [-1.0, 1.0] sample to i16 with the asymmetric scale the
/// backend decoder expects: negatives scale by 32768, positives by 32767,
/// so both endpoints land exactly on the i16 range. Out-of-range input is
/// clamped first.
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_frame(frame: &[u8]) -> Vec<i16> {
        frame
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    #[test]
    fn test_quantize_endpoints_and_clamp() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(2.0), 32767);
        assert_eq!(quantize(-2.0), -32768);
        assert_eq!(quantize(0.5), 16384);
        assert_eq!(quantize(-0.5), -16384);
    }

    #[test]
    fn test_native_rate_passes_through() {
        let encoder = PcmEncoder::new(TARGET_SAMPLE_RATE);
        let input = [0.0, 0.25, -0.25, 1.0, -1.0];
        let frame = encoder.encode(&input, 1);
        let samples = decode_frame(&frame);
        assert_eq!(samples, vec![0, 8192, -8192, 32767, -32768]);
    }

    #[test]
    fn test_integral_factor_picks_every_nth_sample() {
        let encoder = PcmEncoder::new(48_000);
        let input: Vec<f32> = (0..12).map(|i| i as f32 / 16.0).collect();
        let frame = encoder.encode(&input, 1);
        let samples = decode_frame(&frame);
        assert_eq!(samples.len(), 4);
        for (i, &s) in samples.iter().enumerate() {
            assert_eq!(s, quantize(input[i * 3]));
        }
    }

    #[test]
    fn test_fractional_factor_stays_between_neighbors() {
        let encoder = PcmEncoder::new(44_100);
        let input: Vec<f32> = (0..441).map(|i| (i as f32 * 0.37).sin() * 0.9).collect();
        let frame = encoder.encode(&input, 1);
        let samples = decode_frame(&frame);
        assert_eq!(samples.len(), 160);

        let factor = 44_100f64 / 16_000f64;
        for (i, &s) in samples.iter().enumerate() {
            let pos = i as f64 * factor;
            let idx = pos as usize;
            let a = quantize(input[idx]);
            let b = quantize(input[(idx + 1).min(input.len() - 1)]);
            assert!(s >= a.min(b) && s <= a.max(b), "sample {} out of range", i);
        }
    }

    #[test]
    fn test_right_edge_clamps_to_last_sample() {
        // Upsampling from 8 kHz puts the final interpolation position past
        // the last input sample; the second tap must clamp, not read junk.
        let encoder = PcmEncoder::new(8_000);
        let input = [0.0, 0.1, 0.2, 0.3];
        let frame = encoder.encode(&input, 1);
        let samples = decode_frame(&frame);
        assert_eq!(samples.len(), 8);
        assert_eq!(samples[7], quantize(input[3]));
        assert_eq!(samples[6], quantize(input[3]));
    }

    #[test]
    fn test_stereo_consumes_channel_zero_only() {
        let encoder = PcmEncoder::new(TARGET_SAMPLE_RATE);
        let left = [0.1f32, 0.2, 0.3, 0.4];
        let mut interleaved = Vec::new();
        for &l in &left {
            interleaved.push(l);
            interleaved.push(-0.9); // right channel junk must not leak in
        }
        let stereo = encoder.encode(&interleaved, 2);
        let mono = encoder.encode(&left, 1);
        assert_eq!(stereo, mono);
    }

    #[test]
    fn test_empty_input_yields_empty_frame() {
        let encoder = PcmEncoder::new(48_000);
        assert!(encoder.encode(&[], 2).is_empty());
    }

    #[test]
    fn test_i16_input_path() {
        let encoder = PcmEncoder::new(TARGET_SAMPLE_RATE);
        let mut scratch = Vec::new();
        let input = [0i16, 16384, -16384, 32767, -32768];
        let frame = encoder.encode_i16(&input, 1, &mut scratch);
        let samples = decode_frame(&frame);
        // The asymmetric scale shifts full-scale positive by one step.
        assert_eq!(samples, vec![0, 16384, -16384, 32766, -32768]);
    }

    #[test]
    fn test_frame_duration_is_preserved() {
        // 20 ms at any source rate must come out as 20 ms at 16 kHz.
        for rate in [16_000u32, 24_000, 44_100, 48_000] {
            let encoder = PcmEncoder::new(rate);
            let period = (rate / 50) as usize;
            let input = vec![0.01f32; period];
            let frame = encoder.encode(&input, 1);
            assert_eq!(frame.len() / 2, 320, "rate {}", rate);
        }
    }
}
