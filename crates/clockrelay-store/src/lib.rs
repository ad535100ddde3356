//! ClockRelay storage — SQLite persistence for tasks, time entries and the
//! append-only change ledger, plus the sync reconciler.

pub mod sqlite;
pub mod sync;

pub use sqlite::RelayStore;
pub use sync::{full_sync, incremental_sync, sync_time_entries, SyncOutcome};
