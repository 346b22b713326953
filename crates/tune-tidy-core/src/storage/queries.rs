use super::models::*;
use super::sqlite::Database;
use rusqlite::{params, OptionalExtension, Result};
use tracing::debug;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Database {
    // ── Items ────────────────────────────────────────────────────

    pub fn get_item(&self, id: i64) -> Result<Option<ItemRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM item WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                ItemRecord::from_row,
            )
            .optional()
    }

    pub fn find_item_by_location(&self, location: &str) -> Result<Option<ItemRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM item WHERE location = ?1", ITEM_COLUMNS),
                params![location],
                ItemRecord::from_row,
            )
            .optional()
    }

    /// Insert a newly discovered item, or refresh the facts of a known one.
    /// Status, notes and resolver annotations of an existing item are never overwritten.
    /// Returns (item id, created).
    pub fn upsert_item(&self, item: &DiscoveredItem) -> Result<(i64, bool)> {
        let ts = now();
        if let Some(existing) = self.find_item_by_location(&item.location)? {
            self.connection().execute(
                "UPDATE item SET content_digest = ?1, perceptual_digest = ?2, size_bytes = ?3, \
                     modified_at = ?4, format = ?5, artist = ?6, album_artist = ?7, album = ?8, \
                     title = ?9, track = ?10, duration_secs = ?11, bitrate_kbps = ?12, \
                     is_compilation = ?13, destination = ?14, updated_at = ?15 \
                 WHERE id = ?16",
                params![
                    item.content_digest,
                    item.perceptual_digest,
                    item.size_bytes,
                    item.modified_at,
                    item.format,
                    item.artist,
                    item.album_artist,
                    item.album,
                    item.title,
                    item.track,
                    item.duration_secs,
                    item.bitrate_kbps,
                    item.is_compilation,
                    item.destination,
                    ts,
                    existing.id,
                ],
            )?;
            return Ok((existing.id, false));
        }

        self.connection().execute(
            "INSERT INTO item \
             (location, content_digest, perceptual_digest, size_bytes, modified_at, format, \
              artist, album_artist, album, title, track, duration_secs, bitrate_kbps, \
              is_compilation, destination, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
            params![
                item.location,
                item.content_digest,
                item.perceptual_digest,
                item.size_bytes,
                item.modified_at,
                item.format,
                item.artist,
                item.album_artist,
                item.album,
                item.title,
                item.track,
                item.duration_secs,
                item.bitrate_kbps,
                item.is_compilation,
                item.destination,
                ItemStatus::New,
                ts,
            ],
        )?;
        Ok((self.connection().last_insert_rowid(), true))
    }

    pub fn list_items(&self) -> Result<Vec<ItemRecord>> {
        let mut stmt = self
            .connection()
            .prepare(&format!("SELECT {} FROM item ORDER BY id", ITEM_COLUMNS))?;
        let items = stmt
            .query_map([], ItemRecord::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn list_items_with_status(&self, status: ItemStatus) -> Result<Vec<ItemRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM item WHERE status = ?1 ORDER BY id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![status], ItemRecord::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn set_item_status(&self, id: i64, status: ItemStatus) -> Result<()> {
        self.connection().execute(
            "UPDATE item SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status, now(), id],
        )?;
        Ok(())
    }

    /// Record a completed move: new location, applied status and an audit note.
    pub fn relocate_item(&self, id: i64, location: &str, note: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE item SET location = ?1, status = ?2, updated_at = ?3, \
                 notes = CASE WHEN notes = '' THEN ?4 ELSE notes || ' | ' || ?4 END \
             WHERE id = ?5",
            params![location, ItemStatus::Applied, now(), note, id],
        )?;
        Ok(())
    }

    pub fn append_item_note(&self, id: i64, note: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE item SET updated_at = ?1, \
                 notes = CASE WHEN notes = '' THEN ?2 ELSE notes || ' | ' || ?2 END \
             WHERE id = ?3",
            params![now(), note, id],
        )?;
        Ok(())
    }

    /// Write the resolver's annotation. Returns false when the stored values already match.
    pub fn set_evidence_annotation(
        &self,
        id: i64,
        reason: EvidenceReason,
        confidence: f64,
    ) -> Result<bool> {
        let changed = self.connection().execute(
            "UPDATE item SET evidence_reason = ?1, evidence_confidence = ?2, updated_at = ?3 \
             WHERE id = ?4 AND (evidence_reason IS NOT ?1 OR evidence_confidence IS NOT ?2)",
            params![reason, confidence, now(), id],
        )?;
        Ok(changed > 0)
    }

    /// Item ids grouped by identical content digest, groups of two or more, ids ascending.
    pub fn content_digest_groups(&self) -> Result<Vec<(String, Vec<i64>)>> {
        let mut stmt = self.connection().prepare(
            "SELECT content_digest, id FROM item \
             WHERE content_digest IN ( \
                 SELECT content_digest FROM item WHERE content_digest IS NOT NULL \
                 GROUP BY content_digest HAVING COUNT(*) > 1) \
             ORDER BY content_digest, id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>>>()?;

        let mut groups: Vec<(String, Vec<i64>)> = Vec::new();
        for (digest, id) in rows {
            match groups.last_mut() {
                Some((current, ids)) if *current == digest => ids.push(id),
                _ => groups.push((digest, vec![id])),
            }
        }
        Ok(groups)
    }

    /// (id, bitrate) grouped by identical perceptual digest, groups of two or more.
    pub fn perceptual_digest_groups(&self) -> Result<Vec<(String, Vec<(i64, Option<i64>)>)>> {
        let mut stmt = self.connection().prepare(
            "SELECT perceptual_digest, id, bitrate_kbps FROM item \
             WHERE perceptual_digest IN ( \
                 SELECT perceptual_digest FROM item WHERE perceptual_digest IS NOT NULL \
                 GROUP BY perceptual_digest HAVING COUNT(*) > 1) \
             ORDER BY perceptual_digest, id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>>>()?;

        let mut groups: Vec<(String, Vec<(i64, Option<i64>)>)> = Vec::new();
        for (digest, id, bitrate) in rows {
            match groups.last_mut() {
                Some((current, members)) if *current == digest => members.push((id, bitrate)),
                _ => groups.push((digest, vec![(id, bitrate)])),
            }
        }
        Ok(groups)
    }

    /// Items still open for review that lack conclusive exact-digest or fingerprint evidence.
    pub fn metadata_candidates(&self) -> Result<Vec<ItemRecord>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM item \
             WHERE status IN ('new', 'reviewing') \
               AND id NOT IN ( \
                   SELECT duplicate_id FROM evidence_edge \
                   WHERE reason IN ('exact-digest', 'fingerprint')) \
             ORDER BY id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map([], ItemRecord::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(items)
    }

    // ── Evidence ─────────────────────────────────────────────────

    /// Append an evidence edge. Returns false when the (pair, reason) row already exists.
    pub fn insert_evidence(&self, evidence: &NewEvidence) -> Result<bool> {
        let inserted = self.connection().execute(
            "INSERT OR IGNORE INTO evidence_edge \
             (canonical_id, duplicate_id, reason, confidence, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                evidence.canonical_id,
                evidence.duplicate_id,
                evidence.reason,
                evidence.confidence,
                now()
            ],
        )?;
        Ok(inserted > 0)
    }

    pub fn list_evidence(&self) -> Result<Vec<EvidenceEdge>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, canonical_id, duplicate_id, reason, confidence, created_at \
             FROM evidence_edge ORDER BY id",
        )?;
        let edges = stmt
            .query_map([], |row| {
                Ok(EvidenceEdge {
                    id: row.get(0)?,
                    canonical_id: row.get(1)?,
                    duplicate_id: row.get(2)?,
                    reason: row.get(3)?,
                    confidence: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(edges)
    }

    pub fn count_evidence(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM evidence_edge", [], |row| row.get(0))
    }

    // ── Intents ──────────────────────────────────────────────────

    pub fn get_intent(&self, id: i64) -> Result<Option<ActionIntent>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM action_intent WHERE id = ?1", INTENT_COLUMNS),
                params![id],
                ActionIntent::from_row,
            )
            .optional()
    }

    pub fn find_pending_intent_for_item(&self, item_id: i64) -> Result<Option<i64>> {
        self.connection()
            .query_row(
                "SELECT id FROM action_intent WHERE item_id = ?1 AND status = 'pending'",
                params![item_id],
                |row| row.get(0),
            )
            .optional()
    }

    /// True when the item was already archived or soft-removed by an earlier run.
    pub fn has_applied_removal(&self, item_id: i64) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM action_intent \
             WHERE item_id = ?1 AND status = 'applied' AND kind IN ('archive', 'remove-soft')",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// True when a review decision to keep the item as it is (`skip`) has been applied.
    pub fn has_applied_skip(&self, item_id: i64) -> Result<bool> {
        let count: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM action_intent \
             WHERE item_id = ?1 AND status = 'applied' AND kind = 'skip'",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn find_pending_directory_intent(&self, kind: IntentKind, src_path: &str) -> Result<Option<i64>> {
        self.connection()
            .query_row(
                "SELECT id FROM action_intent \
                 WHERE item_id IS NULL AND kind = ?1 AND src_path = ?2 AND status = 'pending'",
                params![kind, src_path],
                |row| row.get(0),
            )
            .optional()
    }

    /// Check-then-insert a pending intent. Returns `None` when the item (or, for directory
    /// intents, the same kind and source) already has a pending intent. Queuing an item
    /// intent moves the item to `reviewing`.
    pub fn queue_intent(&self, intent: &NewIntent) -> Result<Option<i64>> {
        let existing = match intent.item_id {
            Some(item_id) => self.find_pending_intent_for_item(item_id)?,
            None => self.find_pending_directory_intent(intent.kind, &intent.src_path)?,
        };
        if let Some(existing_id) = existing {
            debug!(
                "Pending intent {} already covers {}, not queuing {}",
                existing_id, intent.src_path, intent.kind
            );
            return Ok(None);
        }

        let tx = self.connection().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO action_intent (item_id, kind, src_path, dst_path, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                intent.item_id,
                intent.kind,
                intent.src_path,
                intent.dst_path,
                IntentStatus::Pending,
                now()
            ],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(item_id) = intent.item_id {
            tx.execute(
                "UPDATE item SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![ItemStatus::Reviewing, now(), item_id],
            )?;
        }
        tx.commit()?;
        debug!("Queued {} intent {} for {}", intent.kind, id, intent.src_path);
        Ok(Some(id))
    }

    /// Pending intents in ascending id order, optionally bounded.
    pub fn pending_intents(&self, limit: Option<usize>) -> Result<Vec<ActionIntent>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM action_intent WHERE status = 'pending' ORDER BY id LIMIT ?1",
            INTENT_COLUMNS
        ))?;
        let intents = stmt
            .query_map(params![limit], ActionIntent::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(intents)
    }

    pub fn list_intents(&self) -> Result<Vec<ActionIntent>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM action_intent ORDER BY id",
            INTENT_COLUMNS
        ))?;
        let intents = stmt
            .query_map([], ActionIntent::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(intents)
    }

    pub fn list_intents_with_status(&self, status: IntentStatus) -> Result<Vec<ActionIntent>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM action_intent WHERE status = ?1 ORDER BY id",
            INTENT_COLUMNS
        ))?;
        let intents = stmt
            .query_map(params![status], ActionIntent::from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(intents)
    }

    /// Persist the computed destination before the filesystem move happens.
    pub fn record_intent_destination(&self, id: i64, dst_path: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE action_intent SET dst_path = ?1 WHERE id = ?2 AND status = 'pending'",
            params![dst_path, id],
        )?;
        Ok(())
    }

    pub fn mark_intent_applied(&self, id: i64) -> Result<()> {
        self.connection().execute(
            "UPDATE action_intent SET status = ?1, error_detail = NULL, applied_at = ?2 \
             WHERE id = ?3 AND status = 'pending'",
            params![IntentStatus::Applied, now(), id],
        )?;
        Ok(())
    }

    pub fn mark_intent_error(&self, id: i64, detail: &str) -> Result<()> {
        self.connection().execute(
            "UPDATE action_intent SET status = ?1, error_detail = ?2 \
             WHERE id = ?3 AND status = 'pending'",
            params![IntentStatus::Error, detail, id],
        )?;
        Ok(())
    }

    /// Put an errored intent back in the queue after manual correction.
    pub fn retry_intent(&self, id: i64) -> std::result::Result<(), crate::Error> {
        let intent = self
            .get_intent(id)?
            .ok_or(crate::Error::IntentNotFound(id))?;

        if intent.status != IntentStatus::Error {
            return Err(crate::Error::RetryRejected {
                id,
                reason: format!("status is {}", intent.status),
            });
        }
        if let Some(item_id) = intent.item_id {
            if let Some(other) = self.find_pending_intent_for_item(item_id)? {
                return Err(crate::Error::RetryRejected {
                    id,
                    reason: format!("item {} already has pending intent {}", item_id, other),
                });
            }
        }

        self.connection().execute(
            "UPDATE action_intent SET status = ?1, error_detail = NULL WHERE id = ?2",
            params![IntentStatus::Pending, id],
        )?;
        debug!("Intent {} re-queued", id);
        Ok(())
    }

    // ── Summary ──────────────────────────────────────────────────

    pub fn summary(&self) -> Result<StoreSummary> {
        let mut summary = StoreSummary::default();

        for status in ItemStatus::ALL {
            let count: i64 = self.connection().query_row(
                "SELECT COUNT(*) FROM item WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            summary.items.push((*status, count));
        }
        for reason in EvidenceReason::ALL {
            let count: i64 = self.connection().query_row(
                "SELECT COUNT(*) FROM evidence_edge WHERE reason = ?1",
                params![reason],
                |row| row.get(0),
            )?;
            summary.evidence.push((*reason, count));
        }
        for status in IntentStatus::ALL {
            let count: i64 = self.connection().query_row(
                "SELECT COUNT(*) FROM action_intent WHERE status = ?1",
                params![status],
                |row| row.get(0),
            )?;
            summary.intents.push((*status, count));
        }

        Ok(summary)
    }
}
