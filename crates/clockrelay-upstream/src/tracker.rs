//! Bearer-token client for the upstream time-tracker API.
//!
//! Only two endpoints are consumed — the task list and the time-entry list —
//! and every request goes through the retry runner.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use clockrelay_core::config::TrackerConfig;
use clockrelay_core::error::Result;
use clockrelay_core::types::{Task, TimeEntry};

use crate::retry::{RetryError, RetryPolicy};

#[derive(Clone)]
pub struct TrackerClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl TrackerClient {
    pub fn new(config: &TrackerConfig, retry: RetryPolicy) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client: reqwest::Client::new(),
            retry,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    /// Fetch the full authoritative task list.
    pub async fn fetch_tasks(&self) -> Result<Vec<Task>> {
        let url = self.api_url("tasks");
        let query: &[(String, String)] = &[];
        let body: TaskListResponse = self.retry.run(|| self.get_json(&url, query)).await?;
        Ok(body.tasks.into_iter().map(Into::into).collect())
    }

    /// Fetch time entries for a date range (inclusive).
    pub async fn fetch_time_entries(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<TimeEntry>> {
        let url = self.api_url("time_entries");
        let query = [
            ("from".to_string(), from.to_string()),
            ("to".to_string(), to.to_string()),
        ];
        let body: EntryListResponse = self.retry.run(|| self.get_json(&url, &query)).await?;
        Ok(body.time_entries.into_iter().map(Into::into).collect())
    }

    /// One GET + JSON decode, classified for the retry runner: transport
    /// errors and 5xx are transient, 4xx and decode failures are permanent.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> std::result::Result<T, RetryError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| RetryError::Transient(format!("tracker request failed: {e}")))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(RetryError::Transient(format!("tracker returned {status}")));
        }
        if !status.is_success() {
            return Err(RetryError::Permanent(format!("tracker returned {status}")));
        }
        resp.json::<T>()
            .await
            .map_err(|e| RetryError::Permanent(format!("invalid tracker response: {e}")))
    }
}

// --- Tracker API wire types ---

#[derive(Debug, Deserialize)]
struct TaskListResponse {
    tasks: Vec<TrackerTask>,
}

#[derive(Debug, Deserialize)]
struct EntryListResponse {
    time_entries: Vec<TrackerEntry>,
}

#[derive(Debug, Deserialize)]
struct TrackerTask {
    id: String,
    #[serde(default)]
    parent_id: Option<String>,
    name: String,
    #[serde(default)]
    level: i64,
    #[serde(default)]
    root_group_id: Option<String>,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    archived: bool,
}

impl From<TrackerTask> for Task {
    fn from(t: TrackerTask) -> Self {
        Task {
            id: t.id,
            parent_id: t.parent_id,
            name: t.name,
            level: t.level,
            root_group_id: t.root_group_id,
            owner_id: t.owner_id,
            archived: t.archived,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackerEntry {
    id: String,
    task_id: String,
    user_id: String,
    date: NaiveDate,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    duration_secs: i64,
    #[serde(default)]
    billable: bool,
    #[serde(default)]
    note: Option<String>,
    #[serde(default = "Utc::now")]
    updated_at: DateTime<Utc>,
}

impl From<TrackerEntry> for TimeEntry {
    fn from(e: TrackerEntry) -> Self {
        TimeEntry {
            id: e.id,
            task_id: e.task_id,
            user_id: e.user_id,
            date: e.date,
            start: e.start,
            end: e.end,
            duration_secs: e.duration_secs,
            billable: e.billable,
            note: e.note,
            updated_at: e.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_wire_decoding() {
        let json = r#"{"tasks": [
            {"id": "t1", "name": "API work [2-4]", "level": 2, "owner_id": "u9"},
            {"id": "t2", "name": "misc", "archived": true}
        ]}"#;
        let body: TaskListResponse = serde_json::from_str(json).unwrap();
        let tasks: Vec<Task> = body.tasks.into_iter().map(Into::into).collect();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "API work [2-4]");
        assert_eq!(tasks[0].level, 2);
        assert!(tasks[1].archived);
        assert_eq!(tasks[1].level, 0);
    }

    #[test]
    fn test_entry_wire_decoding() {
        let json = r#"{"time_entries": [
            {"id": "e1", "task_id": "t1", "user_id": "u1", "date": "2026-08-29",
             "start": "2026-08-29T09:00:00Z", "duration_secs": 5400,
             "billable": true, "note": "paired on the parser"}
        ]}"#;
        let body: EntryListResponse = serde_json::from_str(json).unwrap();
        let entries: Vec<TimeEntry> = body.time_entries.into_iter().map(Into::into).collect();
        assert_eq!(entries[0].duration_secs, 5400);
        assert_eq!(entries[0].date.to_string(), "2026-08-29");
        assert_eq!(entries[0].note.as_deref(), Some("paired on the parser"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let cfg = TrackerConfig {
            base_url: "https://api.example.com/".into(),
            token: "tok".into(),
        };
        let client = TrackerClient::new(&cfg, RetryPolicy::default());
        assert_eq!(
            client.api_url("tasks"),
            "https://api.example.com/api/v1/tasks"
        );
    }
}
