use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use std::fmt;
use std::str::FromStr;

/// Declares a closed enum persisted as a TEXT column.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_enum! {
    /// Lifecycle of an item record.
    ///
    /// No stage assigns `Error`. Executor failures are recorded on the intent and the item is
    /// left as it was, ready for retry. `Error` is set only by the review layer through
    /// `Database::set_item_status`.
    ItemStatus {
        New => "new",
        Reviewing => "reviewing",
        Applied => "applied",
        Error => "error",
    }
}

text_enum! {
    /// Why two items are believed to be duplicates.
    EvidenceReason {
        ExactDigest => "exact-digest",
        Fingerprint => "fingerprint",
        MetadataSimilarity => "metadata-similarity",
    }
}

text_enum! {
    IntentKind {
        Migrate => "migrate",
        Archive => "archive",
        RemoveSoft => "remove-soft",
        Skip => "skip",
    }
}

text_enum! {
    IntentStatus {
        Pending => "pending",
        Applied => "applied",
        Error => "error",
    }
}

impl EvidenceReason {
    /// Total order used by the resolver: exact-digest > fingerprint > metadata-similarity.
    pub fn priority(&self) -> u8 {
        match self {
            EvidenceReason::ExactDigest => 3,
            EvidenceReason::Fingerprint => 2,
            EvidenceReason::MetadataSimilarity => 1,
        }
    }
}

const LOSSLESS_FORMATS: &[&str] = &["flac", "wav", "aiff", "aif"];

/// One discovered content file and everything known about it.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub id: i64,
    pub location: String,
    pub content_digest: Option<String>,
    pub perceptual_digest: Option<String>,
    pub size_bytes: i64,
    pub modified_at: i64,
    pub format: String,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: Option<String>,
    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<i64>,
    pub is_compilation: bool,
    pub destination: Option<String>,
    pub status: ItemStatus,
    pub evidence_reason: Option<EvidenceReason>,
    pub evidence_confidence: Option<f64>,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

pub(crate) const ITEM_COLUMNS: &str = "id, location, content_digest, perceptual_digest, \
     size_bytes, modified_at, format, artist, album_artist, album, title, track, \
     duration_secs, bitrate_kbps, is_compilation, destination, status, evidence_reason, \
     evidence_confidence, notes, created_at, updated_at";

impl ItemRecord {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ItemRecord {
            id: row.get(0)?,
            location: row.get(1)?,
            content_digest: row.get(2)?,
            perceptual_digest: row.get(3)?,
            size_bytes: row.get(4)?,
            modified_at: row.get(5)?,
            format: row.get(6)?,
            artist: row.get(7)?,
            album_artist: row.get(8)?,
            album: row.get(9)?,
            title: row.get(10)?,
            track: row.get(11)?,
            duration_secs: row.get(12)?,
            bitrate_kbps: row.get(13)?,
            is_compilation: row.get(14)?,
            destination: row.get(15)?,
            status: row.get(16)?,
            evidence_reason: row.get(17)?,
            evidence_confidence: row.get(18)?,
            notes: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    /// Primary attribution: album artist, falling back to track artist.
    pub fn attribution(&self) -> Option<&str> {
        self.album_artist.as_deref().or(self.artist.as_deref())
    }

    pub fn is_lossless(&self) -> bool {
        LOSSLESS_FORMATS.contains(&self.format.as_str())
    }
}

/// Facts gathered for one file by the ingest stage.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredItem {
    pub location: String,
    pub content_digest: Option<String>,
    pub perceptual_digest: Option<String>,
    pub size_bytes: i64,
    pub modified_at: i64,
    pub format: String,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track: Option<String>,
    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<i64>,
    pub is_compilation: bool,
    pub destination: Option<String>,
}

/// A recorded signal that `duplicate_id` may be a copy of `canonical_id`. Never an instruction.
#[derive(Debug, Clone)]
pub struct EvidenceEdge {
    pub id: i64,
    pub canonical_id: i64,
    pub duplicate_id: i64,
    pub reason: EvidenceReason,
    pub confidence: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidence {
    pub canonical_id: i64,
    pub duplicate_id: i64,
    pub reason: EvidenceReason,
    pub confidence: f64,
}

/// The subset of evidence reasons the planner may act on without a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrongReason {
    ExactDigest,
    Fingerprint,
}

/// Evidence that is allowed to become an intent. Only constructible from an
/// exact-digest or fingerprint edge.
#[derive(Debug, Clone)]
pub struct PlanEligible {
    edge: EvidenceEdge,
    reason: StrongReason,
}

impl PlanEligible {
    pub fn from_edge(edge: EvidenceEdge) -> Option<Self> {
        let reason = match edge.reason {
            EvidenceReason::ExactDigest => StrongReason::ExactDigest,
            EvidenceReason::Fingerprint => StrongReason::Fingerprint,
            EvidenceReason::MetadataSimilarity => return None,
        };
        Some(PlanEligible { edge, reason })
    }

    pub fn edge(&self) -> &EvidenceEdge {
        &self.edge
    }

    pub fn reason(&self) -> StrongReason {
        self.reason
    }

    pub fn confidence(&self) -> f64 {
        self.edge.confidence
    }
}

/// A planned filesystem operation. `item_id` is `None` for directory-level intents.
#[derive(Debug, Clone)]
pub struct ActionIntent {
    pub id: i64,
    pub item_id: Option<i64>,
    pub kind: IntentKind,
    pub src_path: String,
    pub dst_path: Option<String>,
    pub status: IntentStatus,
    pub error_detail: Option<String>,
    pub created_at: String,
    pub applied_at: Option<String>,
}

pub(crate) const INTENT_COLUMNS: &str =
    "id, item_id, kind, src_path, dst_path, status, error_detail, created_at, applied_at";

impl ActionIntent {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ActionIntent {
            id: row.get(0)?,
            item_id: row.get(1)?,
            kind: row.get(2)?,
            src_path: row.get(3)?,
            dst_path: row.get(4)?,
            status: row.get(5)?,
            error_detail: row.get(6)?,
            created_at: row.get(7)?,
            applied_at: row.get(8)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIntent {
    pub item_id: Option<i64>,
    pub kind: IntentKind,
    pub src_path: String,
    pub dst_path: Option<String>,
}

/// Row counts per status and reason, for the `summary` report.
#[derive(Debug, Clone, Default)]
pub struct StoreSummary {
    pub items: Vec<(ItemStatus, i64)>,
    pub evidence: Vec<(EvidenceReason, i64)>,
    pub intents: Vec<(IntentStatus, i64)>,
}
