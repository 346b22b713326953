use crate::config::FingerprintConfig;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, trace, warn};

/// Frames per second of audio used for the energy envelope.
const FRAMES_PER_SECOND: u32 = 10;
const MIN_SECONDS: u32 = 3;
/// Mean-square energy below this is treated as silence.
const SILENCE_FLOOR: f64 = 64.0;

/// External codec that turns a file into raw PCM.
///
/// Implementations return interleaved signed 16-bit samples at their fixed
/// `sample_rate()` and `channels()`, or `None` when the file cannot be decoded.
pub trait PerceptualDecoder: Send + Sync {
    fn decode_prefix(&self, path: &Path, seconds: u32) -> Option<Vec<i16>>;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
}

/// Decodes through the `ffmpeg` binary: `-t <seconds> -f s16le -ac <channels> -ar <rate>`.
pub struct FfmpegDecoder {
    ffmpeg_path: String,
    sample_rate: u32,
    channels: u16,
}

impl FfmpegDecoder {
    pub fn new(config: &FingerprintConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            sample_rate: config.sample_rate,
            channels: config.channels.max(1),
        }
    }

    /// Returns a decoder only when the configured ffmpeg binary runs.
    pub fn probe(config: &FingerprintConfig) -> Option<Self> {
        let status = Command::new(&config.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Some(Self::new(config)),
            Ok(s) => {
                warn!("'{} -version' exited with {}, fingerprinting disabled", config.ffmpeg_path, s);
                None
            }
            Err(e) => {
                warn!("ffmpeg not available ({}), fingerprinting disabled", e);
                None
            }
        }
    }
}

impl PerceptualDecoder for FfmpegDecoder {
    fn decode_prefix(&self, path: &Path, seconds: u32) -> Option<Vec<i16>> {
        let output = Command::new(&self.ffmpeg_path)
            .args(["-v", "quiet", "-t"])
            .arg(seconds.to_string())
            .arg("-i")
            .arg(path)
            .args(["-f", "s16le", "-ac"])
            .arg(self.channels.to_string())
            .arg("-ar")
            .arg(self.sample_rate.to_string())
            .arg("-")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                debug!("ffmpeg failed to start for {}: {}", path.display(), e);
                return None;
            }
        };
        if !output.status.success() || output.stdout.is_empty() {
            trace!("ffmpeg produced no audio for {}", path.display());
            return None;
        }

        Some(
            output
                .stdout
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

/// Derive a compact, re-encoding tolerant digest from decoded PCM.
///
/// The signal is downmixed to mono and cut into 100 ms frames. Each bit records
/// whether frame energy rose relative to the previous frame, which ignores overall
/// volume and most codec noise. Returns `None` for less than three seconds of audio.
pub fn perceptual_digest(samples: &[i16], sample_rate: u32, channels: u16) -> Option<String> {
    let channels = channels.max(1) as usize;
    let frame_len = (sample_rate / FRAMES_PER_SECOND) as usize;
    if frame_len == 0 {
        return None;
    }

    let mono: Vec<f64> = samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| s as f64).sum::<f64>() / channels as f64)
        .collect();

    let frame_count = mono.len() / frame_len;
    if frame_count < (MIN_SECONDS * FRAMES_PER_SECOND) as usize {
        return None;
    }

    let energies: Vec<f64> = mono
        .chunks_exact(frame_len)
        .map(|frame| frame.iter().map(|s| s * s).sum::<f64>() / frame_len as f64)
        .collect();

    let mut bits = Vec::with_capacity(energies.len().div_ceil(8));
    let mut current = 0u8;
    for (i, pair) in energies.windows(2).enumerate() {
        let rising = (pair[0] > SILENCE_FLOOR || pair[1] > SILENCE_FLOOR) && pair[1] > pair[0];
        if rising {
            current |= 1 << (i % 8);
        }
        if i % 8 == 7 {
            bits.push(current);
            current = 0;
        }
    }
    bits.push(current);

    let mut hasher = blake3::Hasher::new();
    hasher.update(&(energies.len() as u64).to_le_bytes());
    hasher.update(&bits);
    Some(hasher.finalize().to_hex()[..32].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(seconds: u32, rate: u32, amplitude: f64) -> Vec<i16> {
        let total = (seconds * rate) as usize;
        (0..total)
            .map(|i| {
                // Amplitude envelope changes every quarter second
                let envelope = 0.25 + 0.75 * (((i / (rate as usize / 4)) % 3) as f64 / 2.0);
                let phase = i as f64 * 440.0 * std::f64::consts::TAU / rate as f64;
                (phase.sin() * amplitude * envelope) as i16
            })
            .collect()
    }

    #[test]
    fn test_too_short_yields_none() {
        let samples = tone(2, 8_000, 10_000.0);
        assert!(perceptual_digest(&samples, 8_000, 1).is_none());
    }

    #[test]
    fn test_volume_invariant() {
        let loud = tone(5, 8_000, 20_000.0);
        let quiet = tone(5, 8_000, 5_000.0);
        let a = perceptual_digest(&loud, 8_000, 1).unwrap();
        let b = perceptual_digest(&quiet, 8_000, 1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_stereo_downmix_matches_mono() {
        let mono = tone(4, 8_000, 12_000.0);
        let stereo: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();
        assert_eq!(
            perceptual_digest(&mono, 8_000, 1),
            perceptual_digest(&stereo, 8_000, 2)
        );
    }

    #[test]
    fn test_different_envelopes_differ() {
        let a = tone(5, 8_000, 12_000.0);
        let b: Vec<i16> = a.iter().rev().copied().collect();
        assert_ne!(perceptual_digest(&a, 8_000, 1), perceptual_digest(&b, 8_000, 1));
    }
}
