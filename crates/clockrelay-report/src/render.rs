//! Report renderer — turns annotated tasks into a `RenderedMessage`.
//!
//! The rich-block and plain-text renderings are built in lock-step so they
//! always describe the same data.

use chrono::{DateTime, Utc};

use clockrelay_core::config::ReportConfig;
use clockrelay_core::estimate::EstimationInfo;
use clockrelay_core::status::{threshold_status, threshold_suggestion, StatusInfo};
use clockrelay_core::types::Task;

use crate::blocks::{combine_blocks, Block, RenderedMessage, CHAR_BUDGET};

/// One task annotated for rendering.
#[derive(Debug, Clone)]
pub struct ReportTask {
    pub task: Task,
    pub estimate: EstimationInfo,
    pub status: StatusInfo,
    pub current_secs: i64,
    pub previous_secs: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub comments: Vec<String>,
}

/// Rendering knobs, resolved from config at startup.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub task_cap: usize,
    pub comment_cap: usize,
    pub comment_len: usize,
}

impl From<ReportConfig> for RenderOptions {
    fn from(cfg: ReportConfig) -> Self {
        Self {
            task_cap: cfg.task_cap,
            comment_cap: cfg.comment_cap,
            comment_len: cfg.comment_len,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        ReportConfig::default().into()
    }
}

/// Render a period report.
///
/// Tasks beyond the cap are dropped with a logged count and a visible
/// "N more" context block, never silently mid-render.
pub fn render_report(title: &str, tasks: &[ReportTask], opts: &RenderOptions) -> RenderedMessage {
    let shown = tasks.len().min(opts.task_cap);
    let dropped = tasks.len() - shown;

    let mut groups: Vec<Vec<Block>> = vec![vec![Block::header(title)]];
    let mut text = format!("{title}\n");

    for rt in &tasks[..shown] {
        let body = task_body(rt, opts);
        text.push_str(&format!("\n{body}\n"));
        groups.push(vec![Block::section(body)]);
    }

    if dropped > 0 {
        tracing::info!("✂️ Report capped: {dropped} of {} tasks dropped", tasks.len());
        let note = format!("…and {dropped} more tasks not shown");
        text.push_str(&format!("\n{note}\n"));
        groups.push(vec![Block::context(note)]);
    }

    // Budget alert when the worst task crosses an alert threshold.
    let worst = tasks[..shown]
        .iter()
        .map(|t| t.estimate.usage_percent)
        .fold(0.0_f64, f64::max);
    if worst >= 80.0 {
        let alert = threshold_status(worst);
        let line = format!(
            "{} {}: {} — {}",
            alert.emoji,
            alert.label,
            alert.description,
            threshold_suggestion(worst)
        );
        text.push_str(&format!("\n{line}\n"));
        groups.push(vec![Block::context(line)]);
    }

    let footer = format!("Generated {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
    text.push_str(&format!("\n{footer}"));
    groups.push(vec![Block::Divider, Block::context(footer)]);

    RenderedMessage {
        blocks: combine_blocks(groups),
        text: cap_text(text),
    }
}

/// Dedicated "nothing happened" message, distinct from an error so readers
/// can tell system-idle from system-broken.
pub fn render_no_changes(title: &str) -> RenderedMessage {
    let text = format!("{title}: no changes this period 🙌");
    RenderedMessage {
        blocks: vec![Block::section(text.clone())],
        text,
    }
}

/// User-facing error message delivered through the normal callback path.
pub fn render_error(reason: &str) -> RenderedMessage {
    let text = format!("❌ Report failed: {reason}");
    RenderedMessage {
        blocks: vec![Block::section(text.clone())],
        text,
    }
}

/// Summary reply for an explicit full-sync command.
pub fn render_sync_summary(created: usize, updated: usize, skipped: usize) -> RenderedMessage {
    let text = format!(
        "✅ Sync complete: {created} created, {updated} updated, {skipped} unchanged"
    );
    RenderedMessage {
        blocks: vec![Block::section(text.clone())],
        text,
    }
}

/// Compact multi-line body for one task: name + estimate, time + usage,
/// start time, then a bounded comment list.
fn task_body(rt: &ReportTask, opts: &RenderOptions) -> String {
    let estimate = match rt.estimate.error {
        None => format!("{} est", rt.estimate.text),
        Some(err) => format!("_{err}_"),
    };
    let mut lines = vec![
        format!("*{}* {estimate}", rt.task.name),
        format!(
            "{} {} worked • {:.0}% of estimate ({})",
            rt.status.emoji,
            fmt_duration(rt.current_secs),
            rt.estimate.usage_percent,
            rt.status.label
        ),
    ];
    if let Some(start) = rt.started_at {
        lines.push(format!("started {}", start.format("%H:%M")));
    }

    let shown = rt.comments.len().min(opts.comment_cap);
    for comment in &rt.comments[..shown] {
        lines.push(format!("> {}", clip(comment, opts.comment_len)));
    }
    if rt.comments.len() > shown {
        lines.push(format!("> …and {} more", rt.comments.len() - shown));
    }
    lines.join("\n")
}

/// "2h 30m" style duration rendering.
pub fn fmt_duration(secs: i64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {mins:02}m")
    } else {
        format!("{mins}m")
    }
}

fn clip(s: &str, cap: usize) -> String {
    if s.chars().count() <= cap {
        s.to_string()
    } else {
        let clipped: String = s.chars().take(cap).collect();
        format!("{clipped}…")
    }
}

fn cap_text(text: String) -> String {
    if text.chars().count() <= CHAR_BUDGET {
        text
    } else {
        let clipped: String = text.chars().take(CHAR_BUDGET - 1).collect();
        format!("{clipped}…")
    }
}
