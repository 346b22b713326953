use super::tags::TrackTags;
use std::path::{Path, PathBuf};

const MAX_COMPONENT_LEN: usize = 120;
const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Make a string safe to use as one path component.
///
/// Strips reserved characters and control characters, trims spaces and dots
/// from both ends and caps the length.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == ' ' || c == '.');
    trimmed.chars().take(MAX_COMPONENT_LEN).collect::<String>().trim_end().to_string()
}

fn component_or(raw: Option<&str>, fallback: &str) -> String {
    let sanitized = raw.map(sanitize_component).unwrap_or_default();
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

/// `<library>/<attribution>/<album>/<NN - title><ext>`.
///
/// Without a title the original file stem is kept; without a track number
/// the `NN - ` prefix is omitted.
pub fn recommended_destination(library_root: &Path, source: &Path, tags: &TrackTags) -> PathBuf {
    let attribution = tags.album_artist.as_deref().or(tags.artist.as_deref());
    let artist_dir = component_or(attribution, UNKNOWN_ARTIST);
    let album_dir = component_or(tags.album.as_deref(), UNKNOWN_ALBUM);

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = component_or(tags.title.as_deref(), &sanitize_component(&stem));

    let file_stem = match tags.track.as_deref() {
        Some(track) => format!("{} - {}", track, title),
        None => title,
    };
    let file_name = match source.extension() {
        Some(ext) => format!("{}.{}", file_stem, ext.to_string_lossy().to_lowercase()),
        None => file_stem,
    };

    library_root.join(artist_dir).join(album_dir).join(file_name)
}
