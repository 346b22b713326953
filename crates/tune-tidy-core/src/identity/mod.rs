pub mod digest;
pub mod layout;
pub mod perceptual;
pub mod tags;

pub use digest::content_digest;
pub use layout::{recommended_destination, sanitize_component};
pub use perceptual::{perceptual_digest, FfmpegDecoder, PerceptualDecoder};
pub use tags::{LoftyTagReader, NoTags, TagReader, TrackTags};

use std::path::Path;
use tracing::warn;

/// Content identity of one item. Either field is `None` when its step failed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentIdentity {
    pub content_digest: Option<String>,
    pub perceptual_digest: Option<String>,
}

/// Computes content identity, with optional perceptual fingerprinting.
pub struct IdentityExtractor {
    decoder: Option<Box<dyn PerceptualDecoder>>,
    seconds: u32,
}

impl IdentityExtractor {
    pub fn new(decoder: Option<Box<dyn PerceptualDecoder>>, seconds: u32) -> Self {
        Self { decoder, seconds }
    }

    /// Digest only.
    pub fn digest_only() -> Self {
        Self::new(None, 0)
    }

    pub fn fingerprinting(&self) -> bool {
        self.decoder.is_some()
    }

    /// Never fails: errors are logged and leave the matching field empty.
    pub fn extract(&self, path: &Path) -> ContentIdentity {
        let content_digest = match content_digest(path) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Could not digest {}: {}", path.display(), e);
                None
            }
        };

        let perceptual_digest = self.decoder.as_ref().and_then(|decoder| {
            let samples = decoder.decode_prefix(path, self.seconds)?;
            perceptual_digest(&samples, decoder.sample_rate(), decoder.channels())
        });

        ContentIdentity {
            content_digest,
            perceptual_digest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct FixedDecoder(Vec<i16>);

    impl PerceptualDecoder for FixedDecoder {
        fn decode_prefix(&self, _path: &Path, _seconds: u32) -> Option<Vec<i16>> {
            Some(self.0.clone())
        }
        fn sample_rate(&self) -> u32 {
            1_000
        }
        fn channels(&self) -> u16 {
            1
        }
    }

    #[test]
    fn test_missing_file_degrades() {
        let extractor = IdentityExtractor::digest_only();
        let identity = extractor.extract(&PathBuf::from("/nonexistent/a.mp3"));
        assert_eq!(identity, ContentIdentity::default());
    }

    #[test]
    fn test_decoder_supplies_perceptual_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"abc").unwrap();

        let samples: Vec<i16> = (0..5_000).map(|i| ((i % 700) * 40) as i16).collect();
        let extractor = IdentityExtractor::new(Some(Box::new(FixedDecoder(samples))), 90);
        let identity = extractor.extract(&path);
        assert!(identity.content_digest.is_some());
        assert!(identity.perceptual_digest.is_some());
    }
}
