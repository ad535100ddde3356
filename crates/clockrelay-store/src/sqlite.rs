//! SQLite backend for tasks, time entries and the task history ledger.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use clockrelay_core::error::{RelayError, Result};
use clockrelay_core::types::{ChangeKind, Task, TaskChange, TimeEntry};

pub struct RelayStore {
    conn: Mutex<Connection>,
}

impl RelayStore {
    /// Open (and initialize) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| RelayError::Store(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and the one-shot CLI commands.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| RelayError::Store(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                name TEXT NOT NULL,
                level INTEGER NOT NULL DEFAULT 0,
                root_group_id TEXT,
                owner_id TEXT,
                archived INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                start_at TEXT,
                end_at TEXT,
                duration_secs INTEGER NOT NULL DEFAULT 0,
                billable INTEGER NOT NULL DEFAULT 0,
                note TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_entries_task_date
                ON time_entries(task_id, date);
            CREATE TABLE IF NOT EXISTS task_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                before_value TEXT,
                after_value TEXT,
                recorded_at TEXT NOT NULL
            );",
        )
        .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RelayError::Store(format!("connection lock poisoned: {e}")))
    }

    /// Liveness probe for the health endpoint.
    pub fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(())
    }

    // --- tasks ---

    pub fn upsert_task(&self, task: &Task) -> Result<()> {
        let conn = self.lock()?;
        upsert_task_on(&conn, task)
    }

    /// Upsert a chunk of tasks inside a single transaction. Per-record
    /// failures do not abort the chunk; they are returned for the caller's
    /// failure policy.
    pub fn upsert_tasks_chunk(&self, tasks: &[Task]) -> Result<(usize, Vec<(String, String)>)> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let mut ok = 0usize;
        let mut failed = Vec::new();
        for task in tasks {
            match upsert_task_on(&tx, task) {
                Ok(()) => ok += 1,
                Err(e) => failed.push((task.id.clone(), e.to_string())),
            }
        }
        tx.commit().map_err(|e| RelayError::Store(e.to_string()))?;
        Ok((ok, failed))
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, name, level, root_group_id, owner_id, archived
                 FROM tasks WHERE id = ?1",
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        match stmt.query_row([id], task_from_row) {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RelayError::Store(e.to_string())),
        }
    }

    /// Load the full task table into memory, keyed by id. Used by the
    /// incremental reconciler to diff before writing.
    pub fn tasks_snapshot(&self) -> Result<HashMap<String, Task>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, parent_id, name, level, root_group_id, owner_id, archived FROM tasks",
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let rows = stmt
            .query_map([], task_from_row)
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(rows
            .filter_map(|r| r.ok())
            .map(|t| (t.id.clone(), t))
            .collect())
    }

    pub fn task_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |r| r.get(0))
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(count as usize)
    }

    // --- history ledger (append-only, never rewritten) ---

    pub fn append_history(
        &self,
        task_id: &str,
        kind: ChangeKind,
        before: Option<&str>,
        after: Option<&str>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO task_history (task_id, kind, before_value, after_value, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                task_id,
                kind.as_str(),
                before,
                after,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn history_for(&self, task_id: &str) -> Result<Vec<TaskChange>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT task_id, kind, before_value, after_value, recorded_at
                 FROM task_history WHERE task_id = ?1 ORDER BY id",
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let rows = stmt
            .query_map([task_id], |row| {
                Ok(TaskChange {
                    task_id: row.get(0)?,
                    kind: ChangeKind::from_str(&row.get::<_, String>(1)?)
                        .unwrap_or(ChangeKind::Created),
                    before: row.get(2)?,
                    after: row.get(3)?,
                    recorded_at: parse_ts(&row.get::<_, String>(4)?),
                })
            })
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    // --- time entries ---

    pub fn upsert_time_entry(&self, entry: &TimeEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO time_entries
             (id, task_id, user_id, date, start_at, end_at, duration_secs, billable, note, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                entry.id,
                entry.task_id,
                entry.user_id,
                entry.date.to_string(),
                entry.start.map(|t| t.to_rfc3339()),
                entry.end.map(|t| t.to_rfc3339()),
                entry.duration_secs,
                entry.billable as i64,
                entry.note,
                entry.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(())
    }

    pub fn entry_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM time_entries", [], |r| r.get(0))
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(count as usize)
    }

    /// Delete time entries that reference a task no longer present.
    /// Returns the number of rows removed.
    pub fn cleanup_orphaned_entries(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM time_entries
                 WHERE task_id NOT IN (SELECT id FROM tasks)",
                [],
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        if removed > 0 {
            tracing::info!("🧹 Removed {removed} orphaned time entries");
        }
        Ok(removed)
    }

    // --- report queries ---

    /// Tasks that have tracked time inside the period, with the summed
    /// duration. Ordering is stable (by task name, then id).
    pub fn tasks_with_time(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<(Task, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT t.id, t.parent_id, t.name, t.level, t.root_group_id, t.owner_id,
                        t.archived, SUM(e.duration_secs)
                 FROM tasks t
                 JOIN time_entries e ON e.task_id = t.id
                 WHERE e.date >= ?1 AND e.date <= ?2 AND t.archived = 0
                 GROUP BY t.id
                 ORDER BY t.name, t.id",
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![from.to_string(), to.to_string()],
                |row| {
                    let task = task_from_row(row)?;
                    let secs: i64 = row.get(7)?;
                    Ok((task, secs))
                },
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Total seconds tracked on one task inside the period.
    pub fn task_duration_between(
        &self,
        task_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<i64> {
        let conn = self.lock()?;
        let secs: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(duration_secs), 0) FROM time_entries
                 WHERE task_id = ?1 AND date >= ?2 AND date <= ?3",
                rusqlite::params![task_id, from.to_string(), to.to_string()],
                |r| r.get(0),
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(secs)
    }

    /// Earliest entry start on a task inside the period.
    pub fn first_start(
        &self,
        task_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let start: Option<String> = conn
            .query_row(
                "SELECT MIN(start_at) FROM time_entries
                 WHERE task_id = ?1 AND date >= ?2 AND date <= ?3 AND start_at IS NOT NULL",
                rusqlite::params![task_id, from.to_string(), to.to_string()],
                |r| r.get(0),
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(start.map(|s| parse_ts(&s)))
    }

    /// All entry notes on a task inside the period, newest first. The
    /// renderer caps how many are shown; fetching them all keeps its
    /// "N more" suffix honest.
    pub fn entry_notes(&self, task_id: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT note FROM time_entries
                 WHERE task_id = ?1 AND date >= ?2 AND date <= ?3
                   AND note IS NOT NULL AND note != ''
                 ORDER BY date DESC, updated_at DESC",
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![task_id, from.to_string(), to.to_string()],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| RelayError::Store(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn upsert_task_on(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tasks
         (id, parent_id, name, level, root_group_id, owner_id, archived)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            task.id,
            task.parent_id,
            task.name,
            task.level,
            task.root_group_id,
            task.owner_id,
            task.archived as i64,
        ],
    )
    .map_err(|e| RelayError::Store(e.to_string()))?;
    Ok(())
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        name: row.get(2)?,
        level: row.get(3)?,
        root_group_id: row.get(4)?,
        owner_id: row.get(5)?,
        archived: row.get::<_, i64>(6)? != 0,
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}
