//! Inbound slash-command payload, topic keyword parsing and period math.

use chrono::{Duration, NaiveDate};
use serde::Deserialize;

/// Form-encoded slash command as the chat platform sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub response_url: String,
}

/// What the command asks for. Parsed from free text with simple keyword
/// matching; unrecognized text falls back to the daily report so the UX
/// stays forgiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Daily,
    Weekly,
    Monthly,
    FullSync,
}

impl Topic {
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("sync") || lower.contains("full") {
            Topic::FullSync
        } else if lower.contains("week") {
            Topic::Weekly
        } else if lower.contains("month") {
            Topic::Monthly
        } else {
            Topic::Daily
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Topic::Daily => "Daily report",
            Topic::Weekly => "Weekly report",
            Topic::Monthly => "Monthly report",
            Topic::FullSync => "Full sync",
        }
    }
}

/// Current and previous reporting windows (dates inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub prev_from: NaiveDate,
    pub prev_to: NaiveDate,
}

/// Compute the reporting window for a topic. Daily compares today against
/// yesterday; weekly and monthly compare trailing windows of equal length.
pub fn period_range(topic: Topic, today: NaiveDate) -> PeriodRange {
    let days = match topic {
        Topic::Daily => 1,
        Topic::Weekly => 7,
        // Calendar months vary; a trailing 30-day window keeps the
        // comparison symmetric.
        Topic::Monthly | Topic::FullSync => 30,
    };
    let from = today - Duration::days(days - 1);
    let prev_to = from - Duration::days(1);
    let prev_from = prev_to - Duration::days(days - 1);
    PeriodRange {
        from,
        to: today,
        prev_from,
        prev_to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_keywords() {
        assert_eq!(Topic::parse("weekly please"), Topic::Weekly);
        assert_eq!(Topic::parse("show me the MONTH"), Topic::Monthly);
        assert_eq!(Topic::parse("full sync"), Topic::FullSync);
        assert_eq!(Topic::parse("sync now"), Topic::FullSync);
        assert_eq!(Topic::parse("daily"), Topic::Daily);
    }

    #[test]
    fn test_unrecognized_text_falls_back_to_daily() {
        assert_eq!(Topic::parse(""), Topic::Daily);
        assert_eq!(Topic::parse("gimme the numbers"), Topic::Daily);
    }

    #[test]
    fn test_daily_range_is_today_vs_yesterday() {
        let today: NaiveDate = "2026-08-29".parse().unwrap();
        let r = period_range(Topic::Daily, today);
        assert_eq!(r.from, today);
        assert_eq!(r.to, today);
        assert_eq!(r.prev_from.to_string(), "2026-08-28");
        assert_eq!(r.prev_to.to_string(), "2026-08-28");
    }

    #[test]
    fn test_weekly_windows_are_adjacent_and_equal() {
        let today: NaiveDate = "2026-08-29".parse().unwrap();
        let r = period_range(Topic::Weekly, today);
        assert_eq!(r.from.to_string(), "2026-08-23");
        assert_eq!(r.prev_to.to_string(), "2026-08-22");
        assert_eq!((r.to - r.from), (r.prev_to - r.prev_from));
    }
}
