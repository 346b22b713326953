use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

/// Extensions the ingest stage treats as audio items.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "m4a", "ogg", "aac", "opus"];

/// Lower-case extension of a supported audio file, or `None`.
pub fn audio_format(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Compile glob ignore patterns, logging and dropping invalid ones.
pub fn compile_patterns(ignore_globs: &[String]) -> Vec<Pattern> {
    ignore_globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

fn is_ignored(entry: &DirEntry, patterns: &[Pattern]) -> bool {
    patterns.iter().any(|p| p.matches_path(entry.path()))
}

/// Walk the roots and collect supported audio files, sorted.
///
/// Symlinks are not followed; unreadable entries are logged and skipped.
pub fn discover_audio_files(roots: &[String], ignore_globs: &[String]) -> Vec<PathBuf> {
    let patterns = compile_patterns(ignore_globs);
    let mut found = Vec::new();

    for root in roots {
        let root = Path::new(root);
        if !root.is_dir() {
            warn!("Source root {} is not a directory, skipping", root.display());
            continue;
        }

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_ignored(e, &patterns));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && audio_format(entry.path()).is_some() {
                        found.push(entry.into_path());
                    }
                }
                Err(e) => warn!("Error accessing entry: {}", e),
            }
        }
    }

    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_audio_format() {
        assert_eq!(audio_format(Path::new("a/b.FLAC")), Some("flac".to_string()));
        assert_eq!(audio_format(Path::new("a/cover.jpg")), None);
        assert_eq!(audio_format(Path::new("a/README")), None);
    }

    #[test]
    fn test_discover_filters_and_ignores() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("album/skipme")).unwrap();
        fs::write(root.join("album/01.mp3"), b"a").unwrap();
        fs::write(root.join("album/02.flac"), b"b").unwrap();
        fs::write(root.join("album/cover.jpg"), b"c").unwrap();
        fs::write(root.join("album/skipme/03.mp3"), b"d").unwrap();

        let ignore = vec![format!("{}/album/skipme", root.display())];
        let files = discover_audio_files(&[root.display().to_string()], &ignore);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["01.mp3", "02.flac"]);
    }
}
