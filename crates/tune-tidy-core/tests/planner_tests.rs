use std::fs;
use tune_tidy_core::plan::{self, PlanOptions};
use tune_tidy_core::storage::models::*;
use tune_tidy_core::storage::Database;

fn add(db: &Database, location: &str, fill: impl FnOnce(&mut DiscoveredItem)) -> i64 {
    let mut item = DiscoveredItem {
        location: location.to_string(),
        size_bytes: 1000,
        format: "mp3".into(),
        artist: Some("Band".into()),
        album: Some("Album".into()),
        title: Some("Song".into()),
        ..DiscoveredItem::default()
    };
    fill(&mut item);
    db.upsert_item(&item).unwrap().0
}

fn edge(db: &Database, canonical: i64, duplicate: i64, reason: EvidenceReason, confidence: f64) {
    db.insert_evidence(&NewEvidence {
        canonical_id: canonical,
        duplicate_id: duplicate,
        reason,
        confidence,
    })
    .unwrap();
}

fn dry_run() -> PlanOptions {
    PlanOptions {
        dry_run: true,
        ..PlanOptions::default()
    }
}

#[test]
fn test_byte_identical_pair_archives_higher_id() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::ExactDigest, 1.0);

    let summary = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(summary.queued, 1);

    let intents = db.list_intents().unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].item_id, Some(b));
    assert_eq!(intents[0].kind, IntentKind::Archive);
    assert_eq!(intents[0].status, IntentStatus::Pending);
    assert_eq!(intents[0].src_path, "/in/b.mp3");

    assert_eq!(db.get_item(b).unwrap().unwrap().status, ItemStatus::Reviewing);
    assert_eq!(db.get_item(a).unwrap().unwrap().status, ItemStatus::New);
}

#[test]
fn test_fingerprint_pair_archives_lower_bitrate() {
    let db = Database::open_in_memory().unwrap();
    let high = add(&db, "/in/high.mp3", |i| i.bitrate_kbps = Some(320));
    let low = add(&db, "/in/low.mp3", |i| i.bitrate_kbps = Some(192));
    edge(&db, high, low, EvidenceReason::Fingerprint, 0.85);

    plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    let intents = db.list_intents().unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].item_id, Some(low));
}

#[test]
fn test_lossless_copy_is_kept() {
    let db = Database::open_in_memory().unwrap();
    let mp3 = add(&db, "/in/a.mp3", |i| i.size_bytes = 9_000);
    let flac = add(&db, "/in/a.flac", |i| {
        i.format = "flac".into();
        i.size_bytes = 100;
    });
    edge(&db, mp3, flac, EvidenceReason::Fingerprint, 0.85);

    plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(db.list_intents().unwrap()[0].item_id, Some(mp3));
}

#[test]
fn test_metadata_evidence_never_planned() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::MetadataSimilarity, 0.95);

    let summary = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(summary.considered, 0);
    assert!(db.list_intents().unwrap().is_empty());
}

#[test]
fn test_below_threshold_is_ignored() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::ExactDigest, 0.5);

    let strict = PlanOptions {
        fingerprint_min_confidence: 0.9,
        ..PlanOptions::default()
    };
    let c = add(&db, "/in/c.mp3", |_| {});
    edge(&db, a, c, EvidenceReason::Fingerprint, 0.85);

    let summary = plan::plan_duplicates(&db, &strict).unwrap();
    assert_eq!(summary.considered, 0);
    assert!(db.list_intents().unwrap().is_empty());
}

#[test]
fn test_safety_filters_reject() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let other_album = add(&db, "/in/b.mp3", |i| i.album = Some("Live".into()));
    let other_artist = add(&db, "/in/c.mp3", |i| i.album_artist = Some("Various".into()));
    let compilation = add(&db, "/in/d.mp3", |i| i.is_compilation = true);
    for dup in [other_album, other_artist, compilation] {
        edge(&db, a, dup, EvidenceReason::ExactDigest, 1.0);
    }

    let summary = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(summary.considered, 3);
    assert_eq!(summary.rejected, 3);
    assert!(db.list_intents().unwrap().is_empty());
}

#[test]
fn test_planner_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::ExactDigest, 1.0);
    edge(&db, a, b, EvidenceReason::Fingerprint, 0.85);

    let first = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(first.queued, 1);
    assert_eq!(first.already_planned, 1);

    let second = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(second.queued, 0);
    assert_eq!(db.list_intents().unwrap().len(), 1);
}

#[test]
fn test_applied_archive_is_not_replanned() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::ExactDigest, 1.0);

    plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    let intent = db.list_intents().unwrap()[0].id;
    db.mark_intent_applied(intent).unwrap();

    let again = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(again.queued, 0);
    assert_eq!(db.list_intents().unwrap().len(), 1);
}

#[test]
fn test_applied_skip_keeps_pair_out_of_plan() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    let c = add(&db, "/in/c.mp3", |_| {});
    let d = add(&db, "/in/d.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::ExactDigest, 1.0);
    edge(&db, c, d, EvidenceReason::ExactDigest, 1.0);

    // Reviewer kept b (the would-be loser) and c (the would-be keeper)
    for (item, location) in [(b, "/in/b.mp3"), (c, "/in/c.mp3")] {
        let skip = db
            .queue_intent(&NewIntent {
                item_id: Some(item),
                kind: IntentKind::Skip,
                src_path: location.into(),
                dst_path: None,
            })
            .unwrap()
            .unwrap();
        db.mark_intent_applied(skip).unwrap();
    }

    let dry = plan::plan_duplicates(&db, &dry_run()).unwrap();
    let real = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!((dry.queued, dry.rejected), (0, 2));
    assert_eq!((real.queued, real.rejected), (0, 2));
    assert!(db
        .list_intents()
        .unwrap()
        .iter()
        .all(|i| i.kind == IntentKind::Skip && i.status == IntentStatus::Applied));
}

#[test]
fn test_dry_run_matches_real_run_without_writes() {
    let db = Database::open_in_memory().unwrap();
    let a = add(&db, "/in/a.mp3", |_| {});
    let b = add(&db, "/in/b.mp3", |_| {});
    let c = add(&db, "/in/c.mp3", |_| {});
    edge(&db, a, b, EvidenceReason::ExactDigest, 1.0);
    edge(&db, a, c, EvidenceReason::ExactDigest, 1.0);
    edge(&db, a, b, EvidenceReason::Fingerprint, 0.85);

    let dry = plan::plan_duplicates(&db, &dry_run()).unwrap();
    assert!(db.list_intents().unwrap().is_empty());
    assert!(db
        .list_items()
        .unwrap()
        .iter()
        .all(|i| i.status == ItemStatus::New));

    let real = plan::plan_duplicates(&db, &PlanOptions::default()).unwrap();
    assert_eq!(
        (dry.considered, dry.queued, dry.rejected, dry.already_planned),
        (real.considered, real.queued, real.rejected, real.already_planned)
    );
    assert_eq!(real.queued, 2);
}

#[test]
fn test_migration_plan() {
    let db = Database::open_in_memory().unwrap();
    let moving = add(&db, "/in/a.mp3", |i| i.destination = Some("/lib/Band/Album/01 - Song.mp3".into()));
    add(&db, "/lib/in-place.mp3", |i| i.destination = Some("/lib/in-place.mp3".into()));
    add(&db, "/in/no-dest.mp3", |_| {});
    let clash = add(&db, "/in/b.mp3", |i| i.destination = Some("/lib/Band/Album/01 - Song.mp3".into()));

    let dry = plan::plan_migrations(&db, true).unwrap();
    assert!(db.list_intents().unwrap().is_empty());

    let summary = plan::plan_migrations(&db, false).unwrap();
    assert_eq!(summary.queued, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(dry.queued, summary.queued);

    let intents = db.list_intents().unwrap();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].item_id, Some(moving));
    assert_eq!(intents[0].kind, IntentKind::Migrate);
    assert_eq!(intents[0].dst_path.as_deref(), Some("/lib/Band/Album/01 - Song.mp3"));
    assert_eq!(db.get_item(clash).unwrap().unwrap().status, ItemStatus::New);

    // The planned item is now reviewing, so a second pass plans nothing new
    assert_eq!(plan::plan_migrations(&db, false).unwrap().queued, 0);
}

#[test]
fn test_cleanup_plan_targets_disposable_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("empty")).unwrap();
    fs::create_dir_all(root.join("art_only")).unwrap();
    fs::write(root.join("art_only/folder.jpg"), vec![0u8; 512]).unwrap();
    fs::create_dir_all(root.join("keep")).unwrap();
    fs::write(root.join("keep/01.mp3"), b"audio").unwrap();

    let db = Database::open_in_memory().unwrap();
    let summary = plan::plan_cleanup(&db, root, 100 * 1024, false).unwrap();
    assert_eq!(summary.considered, 3);
    assert_eq!(summary.queued, 2);

    let mut sources: Vec<String> = db
        .list_intents()
        .unwrap()
        .into_iter()
        .inspect(|i| {
            assert_eq!(i.item_id, None);
            assert_eq!(i.kind, IntentKind::RemoveSoft);
        })
        .map(|i| i.src_path)
        .collect();
    sources.sort();
    assert_eq!(
        sources,
        vec![
            root.join("art_only").to_string_lossy().into_owned(),
            root.join("empty").to_string_lossy().into_owned(),
        ]
    );

    let again = plan::plan_cleanup(&db, root, 100 * 1024, false).unwrap();
    assert_eq!(again.queued, 0);
    assert_eq!(again.already_planned, 2);
}
