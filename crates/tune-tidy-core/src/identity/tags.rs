use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use std::path::Path;
use tracing::trace;

/// Descriptive attributes read from an audio file's embedded tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    /// Two-digit, zero-padded.
    pub track: Option<String>,
    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<i64>,
    pub is_compilation: bool,
}

/// Tag decoding collaborator. Any failure yields empty tags, never an error.
pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> TrackTags;
}

/// Reads tags with lofty.
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> TrackTags {
        match read_with_lofty(path) {
            Ok(tags) => tags,
            Err(e) => {
                trace!("No tags for {}: {}", path.display(), e);
                TrackTags::default()
            }
        }
    }
}

/// Reader for stores that must not touch file contents, e.g. tests.
pub struct NoTags;

impl TagReader for NoTags {
    fn read(&self, _path: &Path) -> TrackTags {
        TrackTags::default()
    }
}

fn read_with_lofty(path: &Path) -> lofty::error::Result<TrackTags> {
    let tagged = Probe::open(path)?.read()?;
    let properties = tagged.properties();

    let duration = properties.duration().as_secs_f64();
    let mut tags = TrackTags {
        duration_secs: (duration > 0.0).then_some(duration),
        bitrate_kbps: properties.audio_bitrate().map(i64::from),
        ..TrackTags::default()
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        tags.artist = clean(tag.artist().as_deref());
        tags.album = clean(tag.album().as_deref());
        tags.title = clean(tag.title().as_deref());
        tags.album_artist = clean(tag.get_string(&ItemKey::AlbumArtist));
        tags.track = tag.track().map(format_track);
        tags.is_compilation = tag
            .get_string(&ItemKey::FlagCompilation)
            .map(is_truthy)
            .unwrap_or(false);
    }

    Ok(tags)
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

pub(crate) fn format_track(number: u32) -> String {
    format!("{:02}", number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_track_pads() {
        assert_eq!(format_track(3), "03");
        assert_eq!(format_track(12), "12");
        assert_eq!(format_track(104), "104");
    }

    #[test]
    fn test_clean_drops_blank() {
        assert_eq!(clean(Some("  Abbey Road ")), Some("Abbey Road".to_string()));
        assert_eq!(clean(Some("   ")), None);
        assert_eq!(clean(None), None);
    }

    #[test]
    fn test_compilation_flag_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("True"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_unreadable_file_yields_empty_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.flac");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert_eq!(LoftyTagReader.read(&path), TrackTags::default());
    }
}
