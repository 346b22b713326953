use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Runtime configuration. Every stage receives the pieces it needs explicitly;
/// nothing is read from process-wide state after loading.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub store_path: String,
    pub source_roots: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub library_root: Option<String>,
    pub archive_root: Option<String>,
    pub trash_root: String,
    pub fingerprint: FingerprintConfig,
    pub planner: PlannerConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FingerprintConfig {
    pub enabled: bool,
    pub seconds: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub ffmpeg_path: String,
}

/// Plan thresholds per evidence reason. Fingerprint evidence is emitted at 0.85, so its
/// threshold sits lower than the exact-digest one or fingerprint pairs would never be planned.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Minimum confidence for exact-digest evidence.
    pub min_confidence: f64,
    /// Minimum confidence for fingerprint evidence.
    pub fingerprint_min_confidence: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub max_image_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: "tune_tidy.db".to_string(),
            source_roots: Vec::new(),
            ignore_patterns: Vec::new(),
            library_root: None,
            archive_root: None,
            trash_root: "to_trash".to_string(),
            fingerprint: FingerprintConfig::default(),
            planner: PlannerConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seconds: 90,
            sample_rate: 44_100,
            channels: 1,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.9,
            fingerprint_min_confidence: 0.85,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 100 * 1024,
        }
    }
}

impl AppConfig {
    pub fn archive_root(&self) -> Option<PathBuf> {
        self.archive_root.as_deref().map(absolute_path)
    }

    pub fn trash_root(&self) -> PathBuf {
        absolute_path(&self.trash_root)
    }

    /// Rewrite the library, archive and trash roots as absolute canonical paths, matching
    /// the form ingest stores item locations in.
    pub fn with_resolved_roots(mut self) -> Self {
        let resolve = |raw: &str| absolute_path(raw).to_string_lossy().into_owned();
        self.library_root = self.library_root.as_deref().map(resolve);
        self.archive_root = self.archive_root.as_deref().map(resolve);
        self.trash_root = resolve(&self.trash_root);
        self
    }
}

/// Absolute form of `raw` with `.`/`..` folded and the longest existing prefix
/// canonicalized. The remainder need not exist yet.
pub fn absolute_path(raw: &str) -> PathBuf {
    let path = Path::new(raw);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(mut canonical) = fs::canonicalize(existing) {
            canonical.extend(missing.iter().rev());
            return canonical;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Load `Config.toml` (optional) overlaid with `TUNE_TIDY__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("TUNE_TIDY")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("source_roots")
                .with_list_parse_key("ignore_patterns")
                .try_parsing(true),
        )
        .build()?;
    Ok(builder.try_deserialize::<AppConfig>()?.with_resolved_roots())
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<String>) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();

    for dir in dirs {
        let dir_path = Path::new(&dir);
        let mut should_add = true;
        let result_clone = result.clone();

        for res_dir in &result_clone {
            let res_dir_path = Path::new(res_dir);

            if dir_path.starts_with(res_dir_path) {
                should_add = false;
                break;
            }

            if res_dir_path.starts_with(dir_path) {
                result.retain(|x| x != res_dir);
                break;
            }
        }

        if should_add {
            result.push(dir);
        }
    }

    result
}
