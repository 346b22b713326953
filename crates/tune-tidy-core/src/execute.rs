use crate::config::AppConfig;
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::storage::models::{ActionIntent, IntentKind};
use crate::storage::Database;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub archive_root: Option<PathBuf>,
    pub trash_root: PathBuf,
    pub dry_run: bool,
    pub limit: Option<usize>,
}

impl ExecutorOptions {
    pub fn from_config(config: &AppConfig, dry_run: bool, limit: Option<usize>) -> Self {
        Self {
            archive_root: config.archive_root(),
            trash_root: config.trash_root(),
            dry_run,
            limit,
        }
    }
}

/// Why an intent could not be applied. Rendered to text only when stored as error detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecFailure {
    MissingSource,
    MissingDestination,
    ArchiveRootNotConfigured,
    DestinationExists(String),
    Filesystem(String),
    Store(String),
}

impl fmt::Display for ExecFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecFailure::MissingSource => f.write_str("missing source"),
            ExecFailure::MissingDestination => f.write_str("missing destination"),
            ExecFailure::ArchiveRootNotConfigured => f.write_str("archive root not configured"),
            ExecFailure::DestinationExists(p) => write!(f, "destination exists: {}", p),
            ExecFailure::Filesystem(e) => write!(f, "filesystem error: {}", e),
            ExecFailure::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl From<rusqlite::Error> for ExecFailure {
    fn from(e: rusqlite::Error) -> Self {
        ExecFailure::Store(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied {
        destination: Option<String>,
        /// The move had already happened in an interrupted run.
        recovered: bool,
    },
    Failed(ExecFailure),
}

/// What happened (or, in dry-run, would happen) to one intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub intent_id: i64,
    pub item_id: Option<i64>,
    pub kind: IntentKind,
    pub outcome: Outcome,
}

#[derive(Debug, Default, Clone)]
pub struct ExecutionSummary {
    pub processed: usize,
    pub migrated: usize,
    pub archived: usize,
    pub removed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub recovered: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ExecutionReport {
    pub summary: ExecutionSummary,
    pub decisions: Vec<Decision>,
}

/// Paths moved earlier in this run. Lets dry-run see the same filesystem a real run would.
#[derive(Default)]
struct RunState {
    vacated: HashSet<PathBuf>,
    claimed: HashSet<PathBuf>,
}

impl RunState {
    fn exists(&self, path: &Path) -> bool {
        self.claimed.contains(path) || (path.exists() && !self.vacated.contains(path))
    }

    fn record_move(&mut self, src: &Path, dst: &Path) {
        self.vacated.insert(src.to_path_buf());
        self.claimed.remove(src);
        self.claimed.insert(dst.to_path_buf());
        self.vacated.remove(dst);
    }
}

/// Apply pending intents in ascending id order. Each intent commits on its own, so the run
/// can be interrupted at any point.
pub fn execute(
    db: &Database,
    options: &ExecutorOptions,
    reporter: &dyn ProgressReporter,
) -> Result<ExecutionReport, Error> {
    let intents = db.pending_intents(options.limit)?;
    let prefix = if options.dry_run { "[dry-run] " } else { "" };
    info!("{}Executing {} pending intents", prefix, intents.len());

    let start = Instant::now();
    reporter.on_stage_start("execute", intents.len());
    let mut report = ExecutionReport::default();
    let mut state = RunState::default();

    for (i, intent) in intents.iter().enumerate() {
        let outcome = match apply_intent(db, intent, options, &mut state) {
            Ok(outcome) => outcome,
            Err(failure) => Outcome::Failed(failure),
        };

        match &outcome {
            Outcome::Applied {
                destination,
                recovered,
            } => {
                info!(
                    "{}Intent {} {} {} -> {}{}",
                    prefix,
                    intent.id,
                    intent.kind,
                    intent.src_path,
                    destination.as_deref().unwrap_or("(in place)"),
                    if *recovered { " (recovered)" } else { "" }
                );
                if *recovered {
                    report.summary.recovered += 1;
                }
                match intent.kind {
                    IntentKind::Migrate => report.summary.migrated += 1,
                    IntentKind::Archive => report.summary.archived += 1,
                    IntentKind::RemoveSoft => report.summary.removed += 1,
                    IntentKind::Skip => report.summary.skipped += 1,
                }
            }
            Outcome::Failed(failure) => {
                warn!("{}Intent {} {} failed: {}", prefix, intent.id, intent.kind, failure);
                report.summary.errored += 1;
                if !options.dry_run {
                    // Only the intent records the failure; the item is left as it was.
                    if let Err(e) = db.mark_intent_error(intent.id, &failure.to_string()) {
                        error!("Could not record failure of intent {}: {}", intent.id, e);
                        return Err(e.into());
                    }
                }
            }
        }

        report.summary.processed += 1;
        report.decisions.push(Decision {
            intent_id: intent.id,
            item_id: intent.item_id,
            kind: intent.kind,
            outcome,
        });
        reporter.on_stage_progress(i + 1);
    }

    reporter.on_stage_complete("execute", start.elapsed().as_secs_f64());
    let s = &report.summary;
    info!(
        "{}Execution complete: {} processed, {} migrated, {} archived, {} removed, {} skipped, {} errors, {} recovered",
        prefix, s.processed, s.migrated, s.archived, s.removed, s.skipped, s.errored, s.recovered
    );
    Ok(report)
}

fn file_name_of(path: &Path, fallback: i64) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

/// `<root>/<item id>_<name>`, or `<root>/dir-<intent id>_<name>` for directory intents.
fn staged_destination(root: &Path, intent: &ActionIntent) -> PathBuf {
    let src = Path::new(&intent.src_path);
    let name = file_name_of(src, intent.id);
    match intent.item_id {
        Some(item_id) => root.join(format!("{}_{}", item_id, name)),
        None => root.join(format!("dir-{}_{}", intent.id, name)),
    }
}

/// Destination for a pending intent. A destination recorded by an earlier attempt wins.
fn destination_for(
    intent: &ActionIntent,
    options: &ExecutorOptions,
) -> Result<Option<PathBuf>, ExecFailure> {
    let recorded = intent.dst_path.as_deref().map(PathBuf::from);
    match intent.kind {
        IntentKind::Skip => Ok(None),
        IntentKind::Migrate => recorded.map(Some).ok_or(ExecFailure::MissingDestination),
        IntentKind::Archive => match recorded {
            Some(p) => Ok(Some(p)),
            None => {
                let root = options
                    .archive_root
                    .as_deref()
                    .ok_or(ExecFailure::ArchiveRootNotConfigured)?;
                Ok(Some(staged_destination(root, intent)))
            }
        },
        IntentKind::RemoveSoft => Ok(Some(
            recorded.unwrap_or_else(|| staged_destination(&options.trash_root, intent)),
        )),
    }
}

fn apply_intent(
    db: &Database,
    intent: &ActionIntent,
    options: &ExecutorOptions,
    state: &mut RunState,
) -> Result<Outcome, ExecFailure> {
    let src = PathBuf::from(&intent.src_path);

    if !state.exists(&src) {
        let recovered = match (intent.kind, intent.dst_path.as_deref()) {
            (IntentKind::Skip, _) | (_, None) => None,
            (_, Some(recorded)) => Some(PathBuf::from(recorded)),
        };
        let Some(dst) = recovered else {
            return Err(ExecFailure::MissingSource);
        };
        if !state.exists(&dst) || !matches_item(db, intent, &dst)? {
            return Err(ExecFailure::MissingSource);
        }
        debug!("Intent {}: source gone but {} present", intent.id, dst.display());
        if !options.dry_run {
            commit_applied(db, intent, &dst)?;
        }
        return Ok(Outcome::Applied {
            destination: Some(dst.to_string_lossy().into_owned()),
            recovered: true,
        });
    }

    let Some(dst) = destination_for(intent, options)? else {
        // skip
        if !options.dry_run {
            commit_applied(db, intent, &src)?;
        }
        return Ok(Outcome::Applied {
            destination: None,
            recovered: false,
        });
    };

    if state.exists(&dst) {
        return Err(ExecFailure::DestinationExists(dst.to_string_lossy().into_owned()));
    }

    let dst_text = dst.to_string_lossy().into_owned();
    if !options.dry_run {
        if intent.dst_path.as_deref() != Some(dst_text.as_str()) {
            db.record_intent_destination(intent.id, &dst_text)?;
        }
        move_path(&src, &dst).map_err(|e| ExecFailure::Filesystem(e.to_string()))?;
        commit_applied(db, intent, &dst)?;
    }
    state.record_move(&src, &dst);

    Ok(Outcome::Applied {
        destination: Some(dst_text),
        recovered: false,
    })
}

/// A leftover destination only counts as our earlier move when its size matches the item.
fn matches_item(db: &Database, intent: &ActionIntent, dst: &Path) -> Result<bool, ExecFailure> {
    let Some(item_id) = intent.item_id else {
        return Ok(dst.is_dir());
    };
    let Some(item) = db.get_item(item_id)? else {
        return Ok(false);
    };
    Ok(fs::metadata(dst)
        .map(|m| m.is_file() && m.len() as i64 == item.size_bytes)
        .unwrap_or(false))
}

fn audit_note(kind: IntentKind) -> &'static str {
    match kind {
        IntentKind::Migrate => "migrated",
        IntentKind::Archive => "archived",
        IntentKind::RemoveSoft => "soft-removed",
        IntentKind::Skip => "skipped",
    }
}

/// Intent applied and item relocated, in one transaction. The stored location is the
/// canonical path, the same form ingest records.
fn commit_applied(db: &Database, intent: &ActionIntent, location: &Path) -> Result<(), ExecFailure> {
    let tx = db.connection().unchecked_transaction()?;
    db.mark_intent_applied(intent.id)?;
    if let Some(item_id) = intent.item_id {
        let canonical = fs::canonicalize(location).unwrap_or_else(|_| location.to_path_buf());
        db.relocate_item(item_id, &canonical.to_string_lossy(), audit_note(intent.kind))?;
    }
    tx.commit()?;
    Ok(())
}

/// Rename, falling back to copy and remove when the rename is refused (e.g. across devices).
fn move_path(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                "rename {} -> {} failed ({}), copying",
                src.display(),
                dst.display(),
                rename_err
            );
            if src.is_dir() {
                copy_dir(src, dst)?;
                fs::remove_dir_all(src)
            } else {
                fs::copy(src, dst)?;
                fs::remove_file(src)
            }
        }
    }
}

fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
