//! Usage classifier — pure mapping from usage percentages and alert
//! thresholds to a display status (emoji + label + description).

use serde::{Deserialize, Serialize};

use crate::config::UsageConfig;

/// Severity tier for per-task classification, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTier {
    NoTime,
    OnTrack,
    HighUsage,
    Critical,
    OverBudget,
}

/// Display status for a classified usage value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusInfo {
    pub tier: StatusTier,
    pub emoji: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// Classify a per-task usage percentage against the configured cut-points.
///
/// `0` → no-time; `(0, mid]` → on-track; `(mid, high]` → high-usage;
/// `(high, 100)` → critical; `≥100` → over-budget.
pub fn task_status(percent: f64, cuts: &UsageConfig) -> StatusInfo {
    if percent <= 0.0 {
        return StatusInfo {
            tier: StatusTier::NoTime,
            emoji: "⚪",
            label: "no time",
            description: "no time tracked yet",
        };
    }
    if percent >= 100.0 {
        return StatusInfo {
            tier: StatusTier::OverBudget,
            emoji: "🔴",
            label: "over budget",
            description: "estimate exhausted",
        };
    }
    if percent > cuts.high {
        StatusInfo {
            tier: StatusTier::Critical,
            emoji: "🟠",
            label: "critical",
            description: "close to the estimate ceiling",
        }
    } else if percent > cuts.mid {
        StatusInfo {
            tier: StatusTier::HighUsage,
            emoji: "🟡",
            label: "high usage",
            description: "over half of the estimate used",
        }
    } else {
        StatusInfo {
            tier: StatusTier::OnTrack,
            emoji: "🟢",
            label: "on track",
            description: "within estimate",
        }
    }
}

/// One row of the fixed threshold table used for monitoring-style reports.
struct ThresholdRow {
    cut: f64,
    emoji: &'static str,
    label: &'static str,
    description: &'static str,
    suggestion: &'static str,
}

/// The single canonical threshold table. Checked in descending order; the
/// suggestion lookup walks the same rows so the two can never diverge.
const THRESHOLD_TABLE: &[ThresholdRow] = &[
    ThresholdRow {
        cut: 100.0,
        emoji: "🚨",
        label: "over budget",
        description: "budget fully consumed",
        suggestion: "Stop and re-plan: the estimate is spent.",
    },
    ThresholdRow {
        cut: 90.0,
        emoji: "🔴",
        label: "critical",
        description: "90% of budget consumed",
        suggestion: "Wrap up or raise the estimate before continuing.",
    },
    ThresholdRow {
        cut: 80.0,
        emoji: "🟠",
        label: "warning",
        description: "80% of budget consumed",
        suggestion: "Check remaining scope against the time left.",
    },
    ThresholdRow {
        cut: 50.0,
        emoji: "🟡",
        label: "halfway",
        description: "half of budget consumed",
        suggestion: "Good moment for a mid-point review.",
    },
];

/// Classify an absolute threshold value against the fixed cut-point table.
/// Below every cut-point, a generic "usage report" status is returned.
pub fn threshold_status(threshold: f64) -> StatusInfo {
    for row in THRESHOLD_TABLE {
        if threshold >= row.cut {
            return StatusInfo {
                tier: tier_for_cut(row.cut),
                emoji: row.emoji,
                label: row.label,
                description: row.description,
            };
        }
    }
    StatusInfo {
        tier: StatusTier::OnTrack,
        emoji: "📊",
        label: "usage report",
        description: "usage below all alert thresholds",
    }
}

/// Suggestion text for a threshold, walking the same table in descending
/// order. Falls back to a generic hint when no cut-point matches.
pub fn threshold_suggestion(threshold: f64) -> &'static str {
    for row in THRESHOLD_TABLE {
        if threshold >= row.cut {
            return row.suggestion;
        }
    }
    "Keep tracking time to refine the estimate."
}

fn tier_for_cut(cut: f64) -> StatusTier {
    if cut >= 100.0 {
        StatusTier::OverBudget
    } else if cut >= 90.0 {
        StatusTier::Critical
    } else {
        StatusTier::HighUsage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> UsageConfig {
        UsageConfig {
            mid: 50.0,
            high: 90.0,
        }
    }

    #[test]
    fn test_task_status_tiers() {
        let cuts = defaults();
        assert_eq!(task_status(0.0, &cuts).tier, StatusTier::NoTime);
        assert_eq!(task_status(25.0, &cuts).tier, StatusTier::OnTrack);
        assert_eq!(task_status(50.0, &cuts).tier, StatusTier::OnTrack);
        assert_eq!(task_status(75.0, &cuts).tier, StatusTier::HighUsage);
        assert_eq!(task_status(90.0, &cuts).tier, StatusTier::HighUsage);
        assert_eq!(task_status(95.0, &cuts).tier, StatusTier::Critical);
        assert_eq!(task_status(100.0, &cuts).tier, StatusTier::OverBudget);
        assert_eq!(task_status(140.0, &cuts).tier, StatusTier::OverBudget);
    }

    #[test]
    fn test_monotonic_severity() {
        let cuts = defaults();
        let mut last = StatusTier::NoTime;
        for p in 0..200 {
            let tier = task_status(p as f64, &cuts).tier;
            assert!(tier >= last, "severity regressed at {p}%");
            last = tier;
        }
    }

    #[test]
    fn test_zero_is_no_time_for_any_cutpoints() {
        for (mid, high) in [(1.0, 2.0), (50.0, 90.0), (99.0, 99.5)] {
            let cuts = UsageConfig { mid, high };
            assert_eq!(task_status(0.0, &cuts).tier, StatusTier::NoTime);
        }
    }

    #[test]
    fn test_threshold_table_descending() {
        assert_eq!(threshold_status(120.0).label, "over budget");
        assert_eq!(threshold_status(95.0).label, "critical");
        assert_eq!(threshold_status(85.0).label, "warning");
        assert_eq!(threshold_status(60.0).label, "halfway");
        assert_eq!(threshold_status(10.0).label, "usage report");
    }

    #[test]
    fn test_suggestion_shares_cutpoints() {
        assert!(threshold_suggestion(100.0).contains("re-plan"));
        assert!(threshold_suggestion(91.0).contains("Wrap up"));
        assert!(threshold_suggestion(10.0).contains("Keep tracking"));
    }
}
