//! Async command dispatcher.
//!
//! The chat platform gives slash commands a response deadline of a few
//! seconds, while a sync + report run takes tens of seconds. The handler
//! therefore acks synchronously before touching any data, runs the real work
//! on a spawned task under a hard wall-clock ceiling, and always delivers
//! exactly one terminal notification (result or error) to the callback URL.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Form, State};
use axum::Json;
use serde_json::{json, Value};

use clockrelay_core::error::Result;
use clockrelay_core::estimate::{parse_task_estimation, usage_percent};
use clockrelay_core::status::task_status;
use clockrelay_report::blocks::RenderedMessage;
use clockrelay_report::{
    render_error, render_no_changes, render_report, render_sync_summary, ReportTask,
};
use clockrelay_store::sync::{full_sync, sync_time_entries, SyncOutcome};

use crate::command::{period_range, SlashCommand, Topic};
use crate::jobs::{Job, JobState};
use crate::server::AppState;

/// Hard wall-clock ceiling for one background job. On expiry the job is
/// killed and a timeout error goes out through the callback path.
pub const JOB_DEADLINE: Duration = Duration::from_secs(120);

/// Slash-command entry point: validate, ack, spawn. The ack is emitted
/// before any data access so the caller's timeout is never at risk.
pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    Form(cmd): Form<SlashCommand>,
) -> Json<Value> {
    let expected = &state.config.verify_token;
    if !expected.is_empty() && cmd.token != *expected {
        tracing::warn!("🚫 Command with bad verification token from {}", cmd.user_name);
        return Json(json!({
            "response_type": "ephemeral",
            "text": "Invalid verification token.",
        }));
    }

    let topic = Topic::parse(&cmd.text);
    let job = Job::from_command(topic, &cmd);
    state.jobs.start(&job.id);
    tracing::info!(
        "📨 Command from {} in {}: {:?} (job {})",
        cmd.user_name,
        cmd.channel_id,
        topic,
        job.id
    );

    let background = state.clone();
    tokio::spawn(async move {
        run_job(background, job).await;
    });

    Json(json!({
        "response_type": "ephemeral",
        "text": format!("⏳ Working on it — your {} is on the way.", topic.title().to_lowercase()),
    }))
}

/// Drive one job to a terminal state and deliver the single terminal
/// notification through the callback URL.
pub async fn run_job(state: Arc<AppState>, job: Job) {
    let outcome = tokio::time::timeout(JOB_DEADLINE, process(&state, &job)).await;

    let (message, terminal) = match outcome {
        Ok(Ok(message)) => (message, JobState::Delivered),
        Ok(Err(e)) => {
            tracing::error!("❌ Job {} failed: {e}", job.id);
            (render_error(&e.to_string()), JobState::Failed(e.to_string()))
        }
        Err(_) => {
            let reason = format!("timed out after {}s", JOB_DEADLINE.as_secs());
            tracing::error!("⏱️ Job {} {reason}", job.id);
            (render_error(&reason), JobState::Failed(reason))
        }
    };

    let delivered = deliver(&state.http, &job.response_url, message.to_payload()).await;
    let terminal = match terminal {
        JobState::Delivered if !delivered => {
            JobState::Failed("callback delivery failed".into())
        }
        t => t,
    };
    state.jobs.set(&job.id, terminal);
}

/// The real work: sync and/or query + annotate + render.
async fn process(state: &AppState, job: &Job) -> Result<RenderedMessage> {
    report_for_topic(state, job.topic).await
}

/// Sync-if-needed, query, annotate and render one report for a topic.
/// Shared by the background dispatcher and the one-shot CLI report command
/// so the two paths cannot drift.
pub async fn report_for_topic(state: &AppState, topic: Topic) -> Result<RenderedMessage> {
    let today = chrono::Utc::now().date_naive();
    let range = period_range(topic, today);

    if topic == Topic::FullSync {
        let outcome = run_full_sync(state, range.prev_from, range.to).await?;
        return Ok(render_sync_summary(
            outcome.created,
            outcome.updated,
            outcome.skipped,
        ));
    }

    // Zero local tasks could mean "truly empty" or "never synced" — a full
    // sync before the fallback report tells the two apart.
    if state.store.task_count()? == 0 {
        tracing::info!("📭 Store is empty, running implicit full sync first");
        run_full_sync(state, range.prev_from, range.to).await?;
    }

    let rows = state.store.tasks_with_time(range.from, range.to)?;
    if rows.is_empty() {
        return Ok(render_no_changes(topic.title()));
    }

    // Classification runs only after the sync batch has committed, so the
    // estimates are never computed from partially-written rows.
    let mut tasks = Vec::with_capacity(rows.len());
    for (task, current_secs) in rows {
        let previous_secs =
            state
                .store
                .task_duration_between(&task.id, range.prev_from, range.prev_to)?;
        let mut estimate = parse_task_estimation(&task.name);
        if estimate.is_valid() {
            estimate.usage_percent =
                usage_percent(current_secs, previous_secs, estimate.pessimistic);
        }
        let status = task_status(estimate.usage_percent, &state.config.usage);
        let started_at = state.store.first_start(&task.id, range.from, range.to)?;
        let comments = state.store.entry_notes(&task.id, range.from, range.to)?;
        tasks.push(ReportTask {
            task,
            estimate,
            status,
            current_secs,
            previous_secs,
            started_at,
            comments,
        });
    }

    Ok(render_report(topic.title(), &tasks, &state.render_options))
}

/// Fetch the authoritative task list and the entries for the window, then
/// reconcile local storage.
async fn run_full_sync(
    state: &AppState,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
) -> Result<SyncOutcome> {
    let fetched = state.tracker.fetch_tasks().await?;
    let outcome = full_sync(&state.store, &fetched)?;
    let entries = state.tracker.fetch_time_entries(from, to).await?;
    sync_time_entries(&state.store, &entries)?;
    state.store.cleanup_orphaned_entries()?;
    Ok(outcome)
}

/// POST the rendered message to the callback URL. Returns whether nothing
/// further is owed to the caller.
///
/// A missing or unparseable URL makes delivery a no-op that counts as
/// success. A non-2xx or transport failure returns `false` and is never
/// retried — the platform's callback endpoints expire, so a late retry
/// buys nothing.
pub async fn deliver(http: &reqwest::Client, response_url: &str, payload: Value) -> bool {
    if response_url.is_empty() {
        tracing::debug!("No callback URL on command, skipping delivery");
        return true;
    }
    if reqwest::Url::parse(response_url).is_err() {
        tracing::warn!("⚠️ Unparseable callback URL, skipping delivery");
        return true;
    }

    match http
        .post(response_url)
        .json(&payload)
        .timeout(Duration::from_secs(10))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("📬 Report delivered to callback URL");
            true
        }
        Ok(resp) => {
            tracing::warn!("⚠️ Callback returned {}", resp.status());
            false
        }
        Err(e) => {
            tracing::warn!("⚠️ Callback delivery failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clockrelay_core::config::{RelayConfig, RetryConfig};
    use clockrelay_core::types::{Task, TimeEntry};
    use clockrelay_store::RelayStore;
    use clockrelay_upstream::{RetryPolicy, TrackerClient};

    fn test_state() -> Arc<AppState> {
        let mut config = RelayConfig::default();
        // Unroutable upstream; tests that hit it want a fast failure.
        config.tracker.base_url = "http://127.0.0.1:9".into();
        let retry = RetryPolicy::from_config(&RetryConfig {
            max_retries: 1,
            initial_wait_ms: 1,
            max_wait_ms: 2,
            multiplier: 2.0,
        });
        let tracker = TrackerClient::new(&config.tracker, retry);
        let store = Arc::new(RelayStore::open_in_memory().unwrap());
        Arc::new(AppState::new(config, store, tracker))
    }

    fn seed(state: &Arc<AppState>) {
        state
            .store
            .upsert_task(&Task {
                id: "t1".into(),
                parent_id: None,
                name: "API work [2-4]".into(),
                level: 0,
                root_group_id: None,
                owner_id: None,
                archived: false,
            })
            .unwrap();
        state
            .store
            .upsert_time_entry(&TimeEntry {
                id: "e1".into(),
                task_id: "t1".into(),
                user_id: "u1".into(),
                date: Utc::now().date_naive(),
                start: Some(Utc::now()),
                end: None,
                duration_secs: 3 * 3600,
                billable: true,
                note: Some("parser work".into()),
                updated_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_callback_url_completes_without_panic() {
        let state = test_state();
        seed(&state);
        let job = Job::from_command(Topic::Daily, &SlashCommand::default());
        let id = job.id.clone();
        state.jobs.start(&id);

        run_job(state.clone(), job).await;

        let terminal = state
            .jobs
            .wait_terminal(&id, Duration::from_secs(5))
            .await;
        assert_eq!(terminal, Some(JobState::Delivered));
    }

    #[tokio::test]
    async fn test_report_classifies_default_cutpoints() {
        let state = test_state();
        seed(&state);
        let job = Job::from_command(Topic::Daily, &SlashCommand::default());
        let message = process(&state, &job).await.unwrap();
        // 3h on a [2-4] estimate is 75% -> high usage at mid=50/high=90.
        assert!(message.text.contains("75% of estimate"), "{}", message.text);
        assert!(message.text.contains("high usage"));
    }

    #[tokio::test]
    async fn test_comment_overflow_suffix_counts_all_notes() {
        let state = test_state();
        seed(&state);
        for i in 0..4 {
            state
                .store
                .upsert_time_entry(&TimeEntry {
                    id: format!("n{i}"),
                    task_id: "t1".into(),
                    user_id: "u1".into(),
                    date: Utc::now().date_naive(),
                    start: None,
                    end: None,
                    duration_secs: 60,
                    billable: true,
                    note: Some(format!("note {i}")),
                    updated_at: Utc::now(),
                })
                .unwrap();
        }
        // 5 notes total, display cap 3: the suffix reports the real remainder.
        let message = report_for_topic(&state, Topic::Daily).await.unwrap();
        assert!(message.text.contains("…and 2 more"), "{}", message.text);
    }

    #[tokio::test]
    async fn test_failed_callback_marks_job_failed() {
        let state = test_state();
        seed(&state);
        // Unroutable callback endpoint: the report renders but the POST fails.
        let cmd = SlashCommand {
            response_url: "http://127.0.0.1:9/hook".into(),
            ..Default::default()
        };
        let job = Job::from_command(Topic::Daily, &cmd);
        let id = job.id.clone();
        state.jobs.start(&id);

        run_job(state.clone(), job).await;

        let terminal = state
            .jobs
            .wait_terminal(&id, Duration::from_secs(5))
            .await;
        match terminal {
            Some(JobState::Failed(reason)) => assert!(reason.contains("delivery"), "{reason}"),
            other => panic!("expected failed delivery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_report_for_topic_syncs_empty_store_first() {
        // Empty store forces an implicit full sync, which fails while the
        // upstream is down; the CLI path shares this behavior.
        let state = test_state();
        let result = report_for_topic(&state, Topic::Daily).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_store_triggers_sync_then_fails_when_upstream_down() {
        let state = test_state();
        let job = Job::from_command(Topic::Daily, &SlashCommand::default());
        let id = job.id.clone();
        state.jobs.start(&id);

        run_job(state.clone(), job).await;

        let terminal = state
            .jobs
            .wait_terminal(&id, Duration::from_secs(5))
            .await;
        assert!(matches!(terminal, Some(JobState::Failed(_))), "{terminal:?}");
    }

    #[tokio::test]
    async fn test_bad_token_is_rejected_before_spawn() {
        let state = test_state();
        let mut with_token = (*state).clone();
        with_token.config.verify_token = "secret".into();
        let state = Arc::new(with_token);

        let cmd = SlashCommand {
            token: "wrong".into(),
            text: "daily".into(),
            ..Default::default()
        };
        let Json(resp) = handle_command(State(state.clone()), Form(cmd)).await;
        assert!(resp["text"].as_str().unwrap().contains("Invalid verification"));
        assert_eq!(state.jobs.active_count(), 0);
    }

    #[tokio::test]
    async fn test_ack_is_immediate_and_ephemeral() {
        let state = test_state();
        seed(&state);
        let cmd = SlashCommand {
            text: "weekly".into(),
            ..Default::default()
        };
        let Json(resp) = handle_command(State(state.clone()), Form(cmd)).await;
        assert_eq!(resp["response_type"], "ephemeral");
        assert!(resp["text"].as_str().unwrap().contains("weekly report"));
    }
}
