//! Sync reconciler — brings local storage in line with a freshly fetched
//! authoritative task list.
//!
//! Two modes: full (transactional chunked upserts, fetched values win) and
//! incremental (diff against an in-memory snapshot, write only what changed).
//! Every creation and name change lands in the append-only history ledger.

use clockrelay_core::error::{RelayError, Result};
use clockrelay_core::types::{ChangeKind, Task, TimeEntry};

use crate::sqlite::RelayStore;

/// Chunk size for full-sync transactions. Purely a memory/log-volume knob,
/// not a correctness boundary.
pub const FULL_SYNC_CHUNK: usize = 100;

/// Counters describing what a sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncOutcome {
    /// Number of rows actually written.
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }
}

/// Full sync: idempotent upsert of every fetched record, in chunks of
/// [`FULL_SYNC_CHUNK`] per transaction. Local fields unconditionally take
/// the fetched values.
///
/// Failure policy: per-record failures are logged and tolerated; the call
/// only errors when every record failed.
pub fn full_sync(store: &RelayStore, fetched: &[Task]) -> Result<SyncOutcome> {
    let snapshot = store.tasks_snapshot()?;
    let mut outcome = SyncOutcome::default();

    for chunk in fetched.chunks(FULL_SYNC_CHUNK) {
        let (ok, failed) = store.upsert_tasks_chunk(chunk)?;
        for (id, err) in &failed {
            tracing::warn!("⚠️ Sync failed for task {id}: {err}");
        }
        outcome.failed += failed.len();

        // Ledger entries only for records that were actually written.
        for task in chunk {
            if failed.iter().any(|(id, _)| id == &task.id) {
                continue;
            }
            match snapshot.get(&task.id) {
                None => {
                    outcome.created += 1;
                    record_change(store, &task.id, ChangeKind::Created, None, Some(&task.name));
                }
                Some(prev) if prev.name != task.name => {
                    outcome.updated += 1;
                    record_change(
                        store,
                        &task.id,
                        ChangeKind::NameChanged,
                        Some(&prev.name),
                        Some(&task.name),
                    );
                }
                Some(_) => outcome.updated += 1,
            }
        }
        tracing::debug!(
            "Full sync chunk: {} upserted, {} failed",
            ok,
            failed.len()
        );
    }

    if !fetched.is_empty() && outcome.failed == fetched.len() {
        return Err(RelayError::Store(format!(
            "full sync failed for all {} records",
            fetched.len()
        )));
    }
    tracing::info!(
        "🔄 Full sync done: {} created, {} updated, {} failed",
        outcome.created,
        outcome.updated,
        outcome.failed
    );
    Ok(outcome)
}

/// Incremental sync: load the existing snapshot, diff field-by-field and
/// only write records that differ. Unchanged records are skipped entirely.
pub fn incremental_sync(store: &RelayStore, fetched: &[Task]) -> Result<SyncOutcome> {
    let snapshot = store.tasks_snapshot()?;
    let mut outcome = SyncOutcome::default();

    for task in fetched {
        match snapshot.get(&task.id) {
            None => match store.upsert_task(task) {
                Ok(()) => {
                    outcome.created += 1;
                    record_change(store, &task.id, ChangeKind::Created, None, Some(&task.name));
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!("⚠️ Insert failed for task {}: {e}", task.id);
                }
            },
            Some(prev) if fields_differ(prev, task) => match store.upsert_task(task) {
                Ok(()) => {
                    outcome.updated += 1;
                    if prev.name != task.name {
                        record_change(
                            store,
                            &task.id,
                            ChangeKind::NameChanged,
                            Some(&prev.name),
                            Some(&task.name),
                        );
                    }
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!("⚠️ Update failed for task {}: {e}", task.id);
                }
            },
            Some(_) => outcome.skipped += 1,
        }
    }

    if !fetched.is_empty() && outcome.failed == fetched.len() {
        return Err(RelayError::Store(format!(
            "incremental sync failed for all {} records",
            fetched.len()
        )));
    }
    tracing::info!(
        "🔄 Incremental sync done: {} created, {} updated, {} skipped",
        outcome.created,
        outcome.updated,
        outcome.skipped
    );
    Ok(outcome)
}

/// Upsert fetched time entries. Entries are never deleted here; orphan
/// cleanup is a separate explicit call.
pub fn sync_time_entries(store: &RelayStore, entries: &[TimeEntry]) -> Result<usize> {
    let mut ok = 0usize;
    let mut failed = 0usize;
    for entry in entries {
        match store.upsert_time_entry(entry) {
            Ok(()) => ok += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!("⚠️ Time entry {} failed: {e}", entry.id);
            }
        }
    }
    if !entries.is_empty() && failed == entries.len() {
        return Err(RelayError::Store(format!(
            "time entry sync failed for all {} records",
            entries.len()
        )));
    }
    Ok(ok)
}

/// Field-by-field comparison across the synced columns.
fn fields_differ(a: &Task, b: &Task) -> bool {
    a.parent_id != b.parent_id
        || a.owner_id != b.owner_id
        || a.name != b.name
        || a.level != b.level
        || a.root_group_id != b.root_group_id
        || a.archived != b.archived
}

fn record_change(
    store: &RelayStore,
    task_id: &str,
    kind: ChangeKind,
    before: Option<&str>,
    after: Option<&str>,
) {
    if let Err(e) = store.append_history(task_id, kind, before, after) {
        tracing::warn!("⚠️ History append failed for {task_id}: {e}");
    }
}
