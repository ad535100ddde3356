//! Transient background jobs with an awaitable terminal state.
//!
//! Jobs live only for the duration of asynchronous processing and are lost
//! on restart — the worst case is a missing final reply, not corruption.
//! Recording the terminal state lets tests await completion deterministically
//! instead of racing a detached task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::command::{SlashCommand, Topic};

/// One inbound command being processed in the background.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub topic: Topic,
    pub response_url: String,
    pub requested_by: String,
    pub channel_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn from_command(topic: Topic, cmd: &SlashCommand) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic,
            response_url: cmd.response_url.clone(),
            requested_by: cmd.user_name.clone(),
            channel_id: cmd.channel_id.clone(),
            submitted_at: Utc::now(),
        }
    }
}

/// State machine: `received → acknowledged → processing → {delivered | failed}`.
/// Only the processing-and-after states are recorded here; the ack happens
/// synchronously before the job is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Processing,
    Delivered,
    Failed(String),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing)
    }
}

/// In-memory registry of job states. Cloning shares the underlying map.
///
/// Terminal entries are taken out by the waiter in [`wait_terminal`] and
/// swept on the next [`start`], so the map never outgrows the set of
/// in-flight jobs.
///
/// [`wait_terminal`]: JobRegistry::wait_terminal
/// [`start`]: JobRegistry::start
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<String, JobState>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, job_id: &str) {
        let mut map = self.inner.lock().unwrap();
        map.retain(|_, s| !s.is_terminal());
        map.insert(job_id.to_string(), JobState::Processing);
    }

    pub fn set(&self, job_id: &str, state: JobState) {
        self.inner.lock().unwrap().insert(job_id.to_string(), state);
    }

    pub fn get(&self, job_id: &str) -> Option<JobState> {
        self.inner.lock().unwrap().get(job_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .values()
            .filter(|s| !s.is_terminal())
            .count()
    }

    /// Total entries currently tracked, terminal included.
    pub fn tracked_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Remove and return the entry if it has reached a terminal state.
    fn take_terminal(&self, job_id: &str) -> Option<JobState> {
        let mut map = self.inner.lock().unwrap();
        if map.get(job_id).is_some_and(|s| s.is_terminal()) {
            map.remove(job_id)
        } else {
            None
        }
    }

    /// Wait until the job reaches a terminal state, or the timeout elapses.
    /// Observing the terminal state evicts the entry.
    pub async fn wait_terminal(&self, job_id: &str, timeout: Duration) -> Option<JobState> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(state) = self.take_terminal(job_id) {
                return Some(state);
            }
            if tokio::time::Instant::now() >= deadline {
                return self.get(job_id);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_terminal_sees_completion() {
        let registry = JobRegistry::new();
        registry.start("j1");
        assert_eq!(registry.active_count(), 1);

        let reg = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            reg.set("j1", JobState::Delivered);
        });

        let state = registry
            .wait_terminal("j1", Duration::from_secs(1))
            .await;
        assert_eq!(state, Some(JobState::Delivered));
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_jobs_are_evicted() {
        let registry = JobRegistry::new();
        for i in 0..1000 {
            let id = format!("job-{i}");
            registry.start(&id);
            registry.set(&id, JobState::Delivered);
        }
        // Each start sweeps earlier terminal entries.
        registry.start("fresh");
        assert_eq!(registry.tracked_count(), 1);
        assert_eq!(registry.active_count(), 1);

        registry.set("fresh", JobState::Delivered);
        let state = registry
            .wait_terminal("fresh", Duration::from_secs(1))
            .await;
        assert_eq!(state, Some(JobState::Delivered));
        assert_eq!(registry.tracked_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_terminal_times_out_on_stuck_job() {
        let registry = JobRegistry::new();
        registry.start("j2");
        let state = registry
            .wait_terminal("j2", Duration::from_millis(50))
            .await;
        assert_eq!(state, Some(JobState::Processing));
    }
}
