//! Estimation parser — extracts an hour-range estimate embedded in a task's
//! display name, e.g. `"API work [2-4]"` or `"Review [1,5h]"`.
//!
//! Six syntactic forms are recognized. The pattern table is ordered and
//! first-match-wins: once an earlier form matches, later forms are never
//! consulted, so the ordering itself is load-bearing and tested.

use regex::Regex;
use std::sync::OnceLock;

/// Upper bound for a single estimation bound, in hours.
pub const MAX_ESTIMATE_HOURS: f64 = 100.0;

/// Non-fatal problems discovered while parsing an estimate annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EstimateError {
    #[error("no estimation given")]
    NoEstimate,
    #[error("invalid estimation numbers")]
    InvalidNumbers,
    #[error("estimation too large (over 100h)")]
    TooLarge,
    #[error("broken estimation (optimistic > pessimistic)")]
    Broken,
}

/// Parsed estimate annotation plus derived usage data.
///
/// `TooLarge` and `Broken` still carry the parsed bounds and text so callers
/// can display what was written; only `NoEstimate` and `InvalidNumbers`
/// leave the bounds at zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EstimationInfo {
    pub optimistic: f64,
    pub pessimistic: f64,
    pub has_range: bool,
    /// Canonical annotation text, e.g. `[2-4]`. Re-parsing this text yields
    /// the same bounds.
    pub text: String,
    pub usage_percent: f64,
    pub error: Option<EstimateError>,
}

impl EstimationInfo {
    fn with_error(error: EstimateError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    /// True when the annotation parsed cleanly.
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Interpretation attached to each pattern in the ordered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EstimateForm {
    /// `[a-b]` (markers on both, on the second, or on neither number).
    Range,
    /// `[a+b]` — pessimistic is the sum.
    Additive,
    /// `[a]` single value — optimistic == pessimistic.
    Single,
}

/// The ordered pattern table. Evaluated top to bottom; the first structural
/// match wins and later rows are unreachable for that name.
fn pattern_table() -> &'static [(EstimateForm, Regex)] {
    static TABLE: OnceLock<Vec<(EstimateForm, Regex)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        const NUM: &str = r"(\d+(?:[.,]\d+)?)";
        let rows = [
            (EstimateForm::Range, format!(r"(?i)\[{NUM}h\s*-\s*{NUM}h\]")),
            (EstimateForm::Range, format!(r"(?i)\[{NUM}\s*-\s*{NUM}h\]")),
            (EstimateForm::Range, format!(r"\[{NUM}\s*-\s*{NUM}\]")),
            (
                EstimateForm::Additive,
                format!(r"(?i)\[{NUM}h?\s*\+\s*{NUM}h?\]"),
            ),
            (EstimateForm::Single, format!(r"(?i)\[{NUM}h\]")),
            (EstimateForm::Single, format!(r"\[{NUM}\]")),
        ];
        rows.into_iter()
            .map(|(form, pat)| (form, Regex::new(&pat).expect("static estimate pattern")))
            .collect()
    })
}

/// Parse a number that may use `.` or `,` as the decimal separator.
fn parse_hours(raw: &str) -> Result<f64, EstimateError> {
    raw.replace(',', ".")
        .parse::<f64>()
        .map_err(|_| EstimateError::InvalidNumbers)
}

/// Render hours without a trailing `.0` for whole values.
fn fmt_hours(h: f64) -> String {
    if h.fract() == 0.0 {
        format!("{}", h as i64)
    } else {
        format!("{h}")
    }
}

/// Canonical annotation text for a parsed estimate.
fn canonical_text(optimistic: f64, pessimistic: f64, has_range: bool) -> String {
    if has_range {
        format!("[{}-{}]", fmt_hours(optimistic), fmt_hours(pessimistic))
    } else {
        format!("[{}]", fmt_hours(pessimistic))
    }
}

/// Extract the estimate annotation from a task display name.
///
/// Validation order: number parse, 100h ceiling, optimistic ≤ pessimistic.
/// Ceiling and ordering violations are informational — the parsed bounds and
/// canonical text are still returned alongside the error.
pub fn parse_task_estimation(name: &str) -> EstimationInfo {
    for (form, re) in pattern_table() {
        let Some(caps) = re.captures(name) else {
            continue;
        };

        let first = match parse_hours(&caps[1]) {
            Ok(v) => v,
            Err(e) => return EstimationInfo::with_error(e),
        };
        let (optimistic, pessimistic, has_range) = match form {
            EstimateForm::Range => {
                let second = match parse_hours(&caps[2]) {
                    Ok(v) => v,
                    Err(e) => return EstimationInfo::with_error(e),
                };
                (first, second, true)
            }
            EstimateForm::Additive => {
                let second = match parse_hours(&caps[2]) {
                    Ok(v) => v,
                    Err(e) => return EstimationInfo::with_error(e),
                };
                (first, first + second, true)
            }
            EstimateForm::Single => (first, first, false),
        };

        let mut info = EstimationInfo {
            optimistic,
            pessimistic,
            has_range,
            text: canonical_text(optimistic, pessimistic, has_range),
            usage_percent: 0.0,
            error: None,
        };
        if optimistic > MAX_ESTIMATE_HOURS || pessimistic > MAX_ESTIMATE_HOURS {
            info.error = Some(EstimateError::TooLarge);
        } else if optimistic > pessimistic {
            info.error = Some(EstimateError::Broken);
        }
        return info;
    }

    EstimationInfo::with_error(EstimateError::NoEstimate)
}

/// Parse a formatted duration into seconds.
///
/// Accepts `HH:MM:SS`, `MM:SS` and a plain seconds count.
pub fn parse_duration_secs(s: &str) -> Result<i64, EstimateError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    let parts: Vec<&str> = s.split(':').collect();
    let nums: Vec<i64> = parts
        .iter()
        .map(|p| p.parse::<i64>().map_err(|_| EstimateError::InvalidNumbers))
        .collect::<Result<_, _>>()?;
    match nums.as_slice() {
        [secs] => Ok(*secs),
        [mins, secs] => Ok(mins * 60 + secs),
        [hours, mins, secs] => Ok(hours * 3600 + mins * 60 + secs),
        _ => Err(EstimateError::InvalidNumbers),
    }
}

/// Usage percentage of the pessimistic bound for a total worked duration.
/// A zero-length pessimistic bound yields 0%, not a division error.
pub fn usage_percent(current_secs: i64, previous_secs: i64, pessimistic_hours: f64) -> f64 {
    if pessimistic_hours <= 0.0 {
        return 0.0;
    }
    let total = (current_secs + previous_secs) as f64;
    total / (pessimistic_hours * 3600.0) * 100.0
}

/// Parse an estimate and compute its usage from formatted duration strings
/// (current and previous period). Any parse problem — including the
/// informational ones — propagates as an error here rather than silently
/// defaulting to 0%.
pub fn parse_with_usage(
    name: &str,
    current: &str,
    previous: &str,
) -> Result<EstimationInfo, EstimateError> {
    let mut info = parse_task_estimation(name);
    if let Some(err) = info.error {
        return Err(err);
    }
    let cur = parse_duration_secs(current)?;
    let prev = parse_duration_secs(previous)?;
    info.usage_percent = usage_percent(cur, prev, info.pessimistic);
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_six_forms() {
        let cases = [
            ("fix auth [2h-4h]", 2.0, 4.0, true),
            ("fix auth [2-4h]", 2.0, 4.0, true),
            ("fix auth [2-4]", 2.0, 4.0, true),
            ("fix auth [2+1]", 2.0, 3.0, true),
            ("fix auth [3h]", 3.0, 3.0, false),
            ("fix auth [3]", 3.0, 3.0, false),
        ];
        for (name, opt, pess, range) in cases {
            let info = parse_task_estimation(name);
            assert_eq!(info.error, None, "{name}");
            assert_eq!(info.optimistic, opt, "{name}");
            assert_eq!(info.pessimistic, pess, "{name}");
            assert_eq!(info.has_range, range, "{name}");
        }
    }

    #[test]
    fn test_comma_decimal_separator() {
        let info = parse_task_estimation("review [1,5-2,5]");
        assert_eq!(info.error, None);
        assert_eq!(info.optimistic, 1.5);
        assert_eq!(info.pessimistic, 2.5);
        assert_eq!(info.text, "[1.5-2.5]");
    }

    #[test]
    fn test_form_order_wins_over_position() {
        // A range anywhere in the name beats a single that appears earlier,
        // because the range row sits higher in the table.
        let info = parse_task_estimation("phase [3] rollout [1-2]");
        assert!(info.has_range);
        assert_eq!(info.optimistic, 1.0);
        assert_eq!(info.pessimistic, 2.0);
    }

    #[test]
    fn test_no_estimate() {
        let info = parse_task_estimation("just a task name");
        assert_eq!(info.error, Some(EstimateError::NoEstimate));
        assert_eq!(info.optimistic, 0.0);
        assert_eq!(info.text, "");
    }

    #[test]
    fn test_too_large_keeps_partial() {
        let info = parse_task_estimation("big one [50-150]");
        assert_eq!(info.error, Some(EstimateError::TooLarge));
        assert_eq!(info.optimistic, 50.0);
        assert_eq!(info.pessimistic, 150.0);
        assert_eq!(info.text, "[50-150]");
    }

    #[test]
    fn test_broken_keeps_partial() {
        let info = parse_task_estimation("Broken [10-5]");
        assert_eq!(info.error, Some(EstimateError::Broken));
        assert_eq!(info.optimistic, 10.0);
        assert_eq!(info.pessimistic, 5.0);
    }

    #[test]
    fn test_parse_is_idempotent_over_canonical_text() {
        for name in ["a [2-4]", "b [2+1]", "c [3h]", "d [1,5-2h]"] {
            let first = parse_task_estimation(name);
            assert!(first.is_valid(), "{name}");
            let second = parse_task_estimation(&first.text);
            assert_eq!(second.optimistic, first.optimistic, "{name}");
            assert_eq!(second.pessimistic, first.pessimistic, "{name}");
            assert_eq!(second.text, first.text, "{name}");
        }
    }

    #[test]
    fn test_duration_parsing() {
        assert_eq!(parse_duration_secs("03:00:00").unwrap(), 10800);
        assert_eq!(parse_duration_secs("90:30").unwrap(), 5430);
        assert_eq!(parse_duration_secs("45").unwrap(), 45);
        assert_eq!(parse_duration_secs("").unwrap(), 0);
        assert_eq!(
            parse_duration_secs("abc"),
            Err(EstimateError::InvalidNumbers)
        );
    }

    #[test]
    fn test_usage_percent_example() {
        // "API work [2-4]" with 3h worked this period -> 75%
        let info = parse_with_usage("API work [2-4]", "03:00:00", "").unwrap();
        assert!(info.has_range);
        assert_eq!(info.optimistic, 2.0);
        assert_eq!(info.pessimistic, 4.0);
        assert_eq!(info.usage_percent, 75.0);
    }

    #[test]
    fn test_zero_pessimistic_yields_zero_percent() {
        assert_eq!(usage_percent(3600, 0, 0.0), 0.0);
    }

    #[test]
    fn test_usage_propagates_parse_error() {
        assert_eq!(
            parse_with_usage("no annotation", "01:00:00", ""),
            Err(EstimateError::NoEstimate)
        );
        assert_eq!(
            parse_with_usage("Broken [10-5]", "01:00:00", ""),
            Err(EstimateError::Broken)
        );
    }
}
