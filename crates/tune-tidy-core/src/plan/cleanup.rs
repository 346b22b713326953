use super::PlanSummary;
use crate::error::Error;
use crate::storage::models::{IntentKind, NewIntent};
use crate::storage::Database;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff"];

fn is_small_image(path: &Path, max_bytes: u64) -> bool {
    let is_image = path
        .extension()
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false);
    is_image
        && fs::metadata(path)
            .map(|m| m.len() <= max_bytes)
            .unwrap_or(false)
}

/// Empty, or holding nothing but small image files. Any subdirectory disqualifies.
pub fn is_disposable_dir(dir: &Path, max_image_bytes: u64) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read {}: {}", dir.display(), e);
            return false;
        }
    };
    for entry in entries {
        let Ok(entry) = entry else {
            return false;
        };
        let path = entry.path();
        if path.is_dir() || !is_small_image(&path, max_image_bytes) {
            return false;
        }
    }
    true
}

/// Queue directory-level `remove-soft` intents for disposable directories below `root`.
/// The root itself is never planned.
pub fn plan_cleanup(
    db: &Database,
    root: &Path,
    max_image_bytes: u64,
    dry_run: bool,
) -> Result<PlanSummary, Error> {
    if !root.is_dir() {
        return Err(Error::InvalidConfig(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let mut summary = PlanSummary::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .min_depth(1);
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        summary.considered += 1;
        let dir = entry.path();
        if !is_disposable_dir(dir, max_image_bytes) {
            summary.rejected += 1;
            continue;
        }

        let src_path = dir.to_string_lossy().into_owned();
        if dry_run {
            info!("{}Soft-remove directory {}", prefix, src_path);
            summary.queued += 1;
            continue;
        }
        match db.queue_intent(&NewIntent {
            item_id: None,
            kind: IntentKind::RemoveSoft,
            src_path: src_path.clone(),
            dst_path: None,
        })? {
            Some(id) => {
                info!("Soft-remove directory {} (intent {})", src_path, id);
                summary.queued += 1;
            }
            None => {
                debug!("Directory {} already planned", src_path);
                summary.already_planned += 1;
            }
        }
    }

    info!(
        "{}Cleanup plan: {} directories considered, {} queued, {} kept, {} already planned",
        prefix, summary.considered, summary.queued, summary.rejected, summary.already_planned
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposable_rules() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        let art = dir.path().join("art");
        let big = dir.path().join("big");
        let music = dir.path().join("music");
        for d in [&empty, &art, &big, &music] {
            fs::create_dir(d).unwrap();
        }
        fs::write(art.join("cover.JPG"), vec![0u8; 1024]).unwrap();
        fs::write(big.join("scan.png"), vec![0u8; 4096]).unwrap();
        fs::write(music.join("01.mp3"), b"x").unwrap();

        assert!(is_disposable_dir(&empty, 2048));
        assert!(is_disposable_dir(&art, 2048));
        assert!(!is_disposable_dir(&big, 2048));
        assert!(!is_disposable_dir(&music, 2048));
        assert!(!is_disposable_dir(dir.path(), 2048), "subdirectories disqualify");
    }
}
