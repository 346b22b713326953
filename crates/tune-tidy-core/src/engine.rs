use crate::config::{self, AppConfig};
use crate::error::Error;
use crate::identity::{
    recommended_destination, FfmpegDecoder, IdentityExtractor, LoftyTagReader, PerceptualDecoder,
    TagReader,
};
use crate::progress::ProgressReporter;
use crate::scanner;
use crate::storage::models::DiscoveredItem;
use crate::storage::Database;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Discovers audio files under the configured source roots and records them as items.
pub struct IngestEngine {
    config: AppConfig,
    extractor: IdentityExtractor,
    tag_reader: Box<dyn TagReader>,
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub discovered: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub digest_failures: usize,
    pub fingerprinted: usize,
    pub discover_duration: Duration,
    pub extract_duration: Duration,
    pub db_write_duration: Duration,
}

struct FileFacts {
    path: PathBuf,
    location: String,
    size_bytes: i64,
    modified_at: i64,
}

impl IngestEngine {
    /// Builds the extractor from `config.fingerprint`; fingerprinting stays off when
    /// it is disabled or ffmpeg cannot be run. The library root is resolved up front so
    /// recommended destinations compare equal to ingested locations.
    pub fn new(config: AppConfig) -> Self {
        let config = config.with_resolved_roots();
        let decoder: Option<Box<dyn PerceptualDecoder>> = if config.fingerprint.enabled {
            FfmpegDecoder::probe(&config.fingerprint)
                .map(|d| Box::new(d) as Box<dyn PerceptualDecoder>)
        } else {
            None
        };
        let extractor = IdentityExtractor::new(decoder, config.fingerprint.seconds);
        Self {
            config,
            extractor,
            tag_reader: Box::new(LoftyTagReader),
        }
    }

    pub fn with_extractor(mut self, extractor: IdentityExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_tag_reader(mut self, reader: Box<dyn TagReader>) -> Self {
        self.tag_reader = reader;
        self
    }

    /// Run ingest:
    /// 1. Walk source roots for supported audio files
    /// 2. Skip files whose size and mtime match an already digested item
    /// 3. Extract identity and tags in parallel
    /// 4. Upsert item records on this thread
    pub fn ingest(
        &self,
        db: &Database,
        reporter: &dyn ProgressReporter,
    ) -> Result<IngestSummary, Error> {
        let roots = config::non_overlapping_directories(self.config.source_roots.clone());
        if roots.is_empty() {
            return Err(Error::InvalidConfig("no source_roots configured".to_string()));
        }
        info!("Ingesting from: {:?}", roots);

        let mut summary = IngestSummary::default();

        // Phase 1: Discover
        reporter.on_discover_start();
        let discover_start = Instant::now();
        let paths = scanner::discover_audio_files(&roots, &self.config.ignore_patterns);
        summary.discover_duration = discover_start.elapsed();
        summary.discovered = paths.len();
        reporter.on_discover_complete(paths.len(), summary.discover_duration.as_secs_f64());

        let mut pending = Vec::new();
        for path in paths {
            let Some(facts) = file_facts(path) else {
                continue;
            };
            if let Some(existing) = db.find_item_by_location(&facts.location)? {
                if existing.size_bytes == facts.size_bytes
                    && existing.modified_at == facts.modified_at
                    && existing.content_digest.is_some()
                {
                    summary.unchanged += 1;
                    continue;
                }
            }
            pending.push(facts);
        }
        debug!(
            "{} files to extract, {} unchanged",
            pending.len(),
            summary.unchanged
        );

        // Phase 2: Extract
        reporter.on_extract_start(pending.len());
        let extract_start = Instant::now();
        let done = AtomicUsize::new(0);
        let total = pending.len();
        let items: Vec<DiscoveredItem> = pending
            .par_iter()
            .map(|facts| {
                let item = self.describe(facts);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.on_extract_progress(n, total);
                item
            })
            .collect();
        summary.extract_duration = extract_start.elapsed();
        reporter.on_extract_complete(summary.extract_duration.as_secs_f64());

        // Phase 3: Write
        let db_start = Instant::now();
        for item in &items {
            if item.content_digest.is_none() {
                summary.digest_failures += 1;
            }
            if item.perceptual_digest.is_some() {
                summary.fingerprinted += 1;
            }
            let (_, created) = db.upsert_item(item)?;
            if created {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }
        summary.db_write_duration = db_start.elapsed();

        info!(
            "Ingest complete: {} discovered, {} new, {} updated, {} unchanged, {} without digest",
            summary.discovered,
            summary.inserted,
            summary.updated,
            summary.unchanged,
            summary.digest_failures
        );
        Ok(summary)
    }

    fn describe(&self, facts: &FileFacts) -> DiscoveredItem {
        let identity = self.extractor.extract(&facts.path);
        let tags = self.tag_reader.read(&facts.path);
        let destination = self
            .config
            .library_root
            .as_deref()
            .map(|lib| recommended_destination(Path::new(lib), &facts.path, &tags))
            .map(|p| p.to_string_lossy().into_owned());

        DiscoveredItem {
            location: facts.location.clone(),
            content_digest: identity.content_digest,
            perceptual_digest: identity.perceptual_digest,
            size_bytes: facts.size_bytes,
            modified_at: facts.modified_at,
            format: scanner::audio_format(&facts.path).unwrap_or_default(),
            artist: tags.artist,
            album_artist: tags.album_artist,
            album: tags.album,
            title: tags.title,
            track: tags.track,
            duration_secs: tags.duration_secs,
            bitrate_kbps: tags.bitrate_kbps,
            is_compilation: tags.is_compilation,
            destination,
        }
    }
}

fn file_facts(path: PathBuf) -> Option<FileFacts> {
    let metadata = match fs::metadata(&path) {
        Ok(m) => m,
        Err(e) => {
            warn!("Error reading metadata for {}: {}", path.display(), e);
            return None;
        }
    };
    let path = match fs::canonicalize(&path) {
        Ok(p) => p,
        Err(e) => {
            warn!("Error canonicalizing {}: {}", path.display(), e);
            path
        }
    };
    let modified_at = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Some(FileFacts {
        location: path.to_string_lossy().into_owned(),
        path,
        size_bytes: metadata.len() as i64,
        modified_at,
    })
}
