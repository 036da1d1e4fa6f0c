//! Normalisation of the date/time values the platform returns.
//!
//! The same field has been observed as a combined ISO string, a bare date, an
//! epoch number and a structured `[y, m, d, h, min]` array. Values are first
//! classified, then string forms run through an ordered list of parsers where
//! the first success wins. A value nothing can parse is shown verbatim.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::Value;

use crate::errors::SchedulingError;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

#[derive(Debug, Clone, PartialEq)]
pub enum RawTemporalValue {
    IsoString(String),
    DateOnlyString(String),
    EpochMillis(i64),
    /// `[year, month, day, hour?, minute?, second?]`
    Structured(Vec<i64>),
}

impl RawTemporalValue {
    pub fn classify(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(RawTemporalValue::EpochMillis),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else if s.chars().all(|c| c.is_ascii_digit()) {
                    s.parse().ok().map(RawTemporalValue::EpochMillis)
                } else if s.contains(':') {
                    Some(RawTemporalValue::IsoString(s.to_string()))
                } else {
                    Some(RawTemporalValue::DateOnlyString(s.to_string()))
                }
            }
            Value::Array(items) => {
                let parts: Option<Vec<i64>> = items.iter().map(Value::as_i64).collect();
                parts
                    .filter(|p| p.len() >= 3)
                    .map(RawTemporalValue::Structured)
            }
            Value::Object(map) => {
                let field = |names: &[&str]| names.iter().find_map(|n| map.get(*n)?.as_i64());
                let year = field(&["year"])?;
                let month = field(&["monthValue", "month"])?;
                let day = field(&["dayOfMonth", "day"])?;
                let mut parts = vec![year, month, day];
                if let Some(hour) = field(&["hour"]) {
                    parts.push(hour);
                    parts.push(field(&["minute"]).unwrap_or(0));
                }
                Some(RawTemporalValue::Structured(parts))
            }
            _ => None,
        }
    }

    pub fn has_time(&self) -> bool {
        match self {
            RawTemporalValue::IsoString(_) | RawTemporalValue::EpochMillis(_) => true,
            RawTemporalValue::DateOnlyString(_) => false,
            RawTemporalValue::Structured(parts) => parts.len() > 3,
        }
    }
}

type Strategy = fn(&str) -> Option<NaiveDateTime>;

/// Tried in order; the first parser that yields a valid date wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("iso", parse_iso),
    ("split", parse_split),
    ("date_only", parse_date_only),
    ("epoch", parse_epoch),
];

pub fn normalize(raw: &RawTemporalValue) -> Option<NaiveDateTime> {
    match raw {
        RawTemporalValue::IsoString(s) | RawTemporalValue::DateOnlyString(s) => normalize_text(s),
        RawTemporalValue::EpochMillis(n) => from_epoch(*n),
        RawTemporalValue::Structured(parts) => from_parts(parts),
    }
}

pub fn normalize_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    STRATEGIES.iter().find_map(|(name, parse)| {
        let parsed = parse(s);
        if parsed.is_some() {
            tracing::debug!(strategy = name, input = s, "parsed temporal value");
        }
        parsed
    })
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Splits into date and time halves and rebuilds the value as local wall time,
/// ignoring any zone suffix.
fn parse_split(s: &str) -> Option<NaiveDateTime> {
    let (date_part, time_part) = s.split_once(['T', ' '])?;
    let date = parse_date(date_part)?;

    let time_part = time_part.trim().trim_end_matches('Z');
    let time_part = match time_part.find(['+', '-']) {
        Some(idx) => &time_part[..idx],
        None => time_part,
    };
    let time_part = time_part.split('.').next().unwrap_or(time_part);
    let time = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time_part, fmt).ok())?;

    Some(date.and_time(time))
}

fn parse_date_only(s: &str) -> Option<NaiveDateTime> {
    parse_date(s).map(|d| d.and_time(NaiveTime::MIN))
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    s.parse::<i64>().ok().and_then(from_epoch)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

/// Values below 10^11 are taken as seconds, larger ones as milliseconds.
fn from_epoch(n: i64) -> Option<NaiveDateTime> {
    let millis = if n.unsigned_abs() < 100_000_000_000 {
        n.checked_mul(1000)?
    } else {
        n
    };
    DateTime::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&Local).naive_local())
}

fn from_parts(parts: &[i64]) -> Option<NaiveDateTime> {
    let get = |i: usize| parts.get(i).copied().unwrap_or(0);
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(get(0)).ok()?,
        u32::try_from(get(1)).ok()?,
        u32::try_from(get(2)).ok()?,
    )?;
    let time = NaiveTime::from_hms_opt(
        u32::try_from(get(3)).ok()?,
        u32::try_from(get(4)).ok()?,
        u32::try_from(get(5)).ok()?,
    )?;
    Some(date.and_time(time))
}

/// Classifies and normalises a raw JSON value in one step.
pub fn parse_value(value: &Value) -> Result<NaiveDateTime, SchedulingError> {
    RawTemporalValue::classify(value)
        .as_ref()
        .and_then(normalize)
        .ok_or_else(|| SchedulingError::Formatting(value.to_string()))
}

/// Zero-padded `HH:MM` from a server time field such as `14:00:00`.
pub fn normalize_time(s: &str) -> Option<String> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .map(|t| t.format("%H:%M").to_string())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisplaySchedule {
    pub starts_at: Option<NaiveDateTime>,
    pub date_label: String,
    pub time_label: String,
    /// Set when no parser understood the date and the raw text is shown.
    pub verbatim: bool,
}

/// Builds display labels for a server date plus optional separate time field.
/// The server's time field wins over any time inside the date value.
pub fn display_schedule(date: Option<&Value>, time: Option<&str>) -> DisplaySchedule {
    let server_time = time.filter(|t| !t.trim().is_empty());
    let raw = date.and_then(RawTemporalValue::classify);
    let parsed = match date.filter(|v| !v.is_null()) {
        Some(value) => parse_value(value)
            .map_err(|e| tracing::warn!(error = %e, "showing appointment date verbatim"))
            .ok(),
        None => None,
    };

    let time_label = match server_time {
        Some(t) => normalize_time(t).unwrap_or_else(|| t.trim().to_string()),
        None => match (&raw, parsed) {
            (Some(r), Some(dt)) if r.has_time() => dt.format("%H:%M").to_string(),
            _ => String::new(),
        },
    };

    match parsed {
        Some(dt) => {
            let starts_at = match server_time.and_then(normalize_time) {
                Some(t) => NaiveTime::parse_from_str(&t, "%H:%M")
                    .ok()
                    .map(|t| dt.date().and_time(t)),
                None => Some(dt),
            };
            DisplaySchedule {
                starts_at,
                date_label: dt.format("%d/%m/%Y").to_string(),
                time_label,
                verbatim: false,
            }
        }
        None => {
            let raw_text = match date {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            DisplaySchedule {
                starts_at: None,
                date_label: raw_text,
                time_label,
                verbatim: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            RawTemporalValue::classify(&json!("2025-03-10T09:00:00")),
            Some(RawTemporalValue::IsoString("2025-03-10T09:00:00".to_string()))
        );
        assert_eq!(
            RawTemporalValue::classify(&json!("2025-03-10")),
            Some(RawTemporalValue::DateOnlyString("2025-03-10".to_string()))
        );
        assert_eq!(
            RawTemporalValue::classify(&json!(1741597200000i64)),
            Some(RawTemporalValue::EpochMillis(1741597200000))
        );
        assert_eq!(
            RawTemporalValue::classify(&json!("1741597200000")),
            Some(RawTemporalValue::EpochMillis(1741597200000))
        );
        assert_eq!(
            RawTemporalValue::classify(&json!([2025, 3, 10, 9, 30])),
            Some(RawTemporalValue::Structured(vec![2025, 3, 10, 9, 30]))
        );
        assert_eq!(
            RawTemporalValue::classify(&json!({"year": 2025, "monthValue": 3, "dayOfMonth": 10})),
            Some(RawTemporalValue::Structured(vec![2025, 3, 10]))
        );
        assert_eq!(RawTemporalValue::classify(&json!("")), None);
        assert_eq!(RawTemporalValue::classify(&json!(true)), None);
    }

    #[test]
    fn test_iso_first() {
        assert_eq!(normalize_text("2025-03-10T09:00:00"), Some(dt("2025-03-10 09:00")));
        assert_eq!(normalize_text("2025-03-10T09:00:00.000"), Some(dt("2025-03-10 09:00")));
    }

    #[test]
    fn test_split_handles_space_and_day_first_dates() {
        assert_eq!(normalize_text("2025-03-10 14:30"), Some(dt("2025-03-10 14:30")));
        assert_eq!(normalize_text("10/03/2025 14:30:00"), Some(dt("2025-03-10 14:30")));
    }

    #[test]
    fn test_date_only() {
        assert_eq!(normalize_text("2025-03-10"), Some(dt("2025-03-10 00:00")));
        assert_eq!(normalize_text("10-03-2025"), Some(dt("2025-03-10 00:00")));
    }

    #[test]
    fn test_epoch_seconds_and_millis_agree() {
        let from_secs = normalize(&RawTemporalValue::EpochMillis(1_741_597_200));
        let from_millis = normalize(&RawTemporalValue::EpochMillis(1_741_597_200_000));
        assert!(from_secs.is_some());
        assert_eq!(from_secs, from_millis);
        assert_eq!(normalize_text("1741597200000"), from_millis);
    }

    #[test]
    fn test_extreme_negative_epochs_shown_verbatim() {
        for raw in [json!(i64::MIN), json!(i64::MIN.to_string()), json!(-1e300)] {
            let schedule = display_schedule(Some(&raw), Some("14:00"));
            assert!(schedule.verbatim, "{raw} should not normalise");
            assert_eq!(schedule.starts_at, None);
            assert_eq!(schedule.time_label, "14:00");
        }
    }

    #[test]
    fn test_garbage_fails_every_strategy() {
        assert_eq!(normalize_text("next tuesday-ish"), None);
        assert_eq!(normalize_text("2025-13-45"), None);
    }

    #[test]
    fn test_display_prefers_server_time_field() {
        let schedule = display_schedule(Some(&json!("2025-03-10T09:00:00")), Some("14:00:00"));
        assert_eq!(schedule.date_label, "10/03/2025");
        assert_eq!(schedule.time_label, "14:00");
        assert_eq!(schedule.starts_at, Some(dt("2025-03-10 14:00")));
        assert!(!schedule.verbatim);
    }

    #[test]
    fn test_display_date_only_has_no_time_label() {
        let schedule = display_schedule(Some(&json!("2025-03-10")), None);
        assert_eq!(schedule.date_label, "10/03/2025");
        assert_eq!(schedule.time_label, "");
    }

    #[test]
    fn test_display_falls_back_to_verbatim() {
        let schedule = display_schedule(Some(&json!("sometime soon")), Some("10:00"));
        assert!(schedule.verbatim);
        assert_eq!(schedule.date_label, "sometime soon");
        assert_eq!(schedule.time_label, "10:00");
        assert!(schedule.starts_at.is_none());
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time("9:05"), Some("09:05".to_string()));
        assert_eq!(normalize_time("14:00:00"), Some("14:00".to_string()));
        assert_eq!(normalize_time("2pm"), None);
    }
}
