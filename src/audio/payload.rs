//! Agent audio payload handling: MIME sniffing and WAV synthesis.
//!
//! The backend's TTS provider ships speech either as a real container (WAV,
//! MPEG, OGG) or as headerless linear PCM described only by a MIME string
//! like `audio/L16;codec=pcm;rate=24000`. Raw PCM cannot be decoded as-is,
//! so it gets a canonical 44-byte WAV header synthesized in front of it
//! before the decoder ever sees the bytes.

/// What the MIME string says the payload is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Already a WAV container, usable verbatim.
    Wav,
    /// Headerless 16-bit linear PCM at the given rate.
    RawPcm { sample_rate: u32 },
    /// Some other container; hand it to the decoder untouched.
    Other { mime: String },
}

/// A payload ready for the decoder, with the MIME it will be treated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Classify a payload from its MIME string alone.
///
/// Matching is case-insensitive on substrings: anything mentioning `wav`
/// is a WAV container, anything mentioning `linear16` or `pcm` is raw PCM
/// (its rate read from a `rate=` token, else `fallback_rate`). A missing
/// or blank MIME falls back to `default_mime`.
pub fn sniff_format(mime: Option<&str>, default_mime: &str, fallback_rate: u32) -> PayloadFormat {
    let mime = match mime.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m,
        None => return PayloadFormat::Other { mime: default_mime.to_string() },
    };
    let lower = mime.to_ascii_lowercase();
    if lower.contains("wav") {
        PayloadFormat::Wav
    } else if lower.contains("linear16") || lower.contains("pcm") {
        PayloadFormat::RawPcm {
            sample_rate: parse_rate_token(&lower).unwrap_or(fallback_rate),
        }
    } else {
        PayloadFormat::Other { mime: mime.to_string() }
    }
}

/// Pull the sample rate out of a MIME parameter list: the digits after the
/// first `rate=` (which also matches `samplerate=`), 3 to 6 of them.
pub fn parse_rate_token(mime: &str) -> Option<u32> {
    let lower = mime.to_ascii_lowercase();
    let start = lower.find("rate=")? + "rate=".len();
    let digits: String = lower[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .take(6)
        .collect();
    if digits.len() < 3 {
        return None;
    }
    digits.parse().ok()
}

/// Prepend a canonical 44-byte RIFF/WAVE header to 16-bit PCM data.
///
/// Layout: RIFF chunk size 36 + data, a 16-byte PCM `fmt ` chunk, then the
/// `data` chunk. All fields little-endian.
pub fn wrap_pcm_in_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_size = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}

/// Turn one inbound payload into a decodable clip. Raw PCM gets a header
/// synthesized (mono, the sniffed rate); everything else passes through.
pub fn build_clip(
    mime: Option<&str>,
    data: Vec<u8>,
    default_mime: &str,
    fallback_rate: u32,
) -> AudioClip {
    match sniff_format(mime, default_mime, fallback_rate) {
        PayloadFormat::Wav => AudioClip { mime: "audio/wav".to_string(), data },
        PayloadFormat::RawPcm { sample_rate } => AudioClip {
            mime: "audio/wav".to_string(),
            data: wrap_pcm_in_wav(&data, sample_rate, 1),
        },
        PayloadFormat::Other { mime } => AudioClip { mime, data },
    }
}
