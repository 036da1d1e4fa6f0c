use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INTENT_DURATION_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum DateReference {
    Today,
    Tomorrow,
    DayAfterTomorrow,
    ThisWeek,
    NextWeek,
    Weekday(Weekday),
    On(NaiveDate),
}

impl DateReference {
    /// Resolves to a calendar date. `ThisWeek` means the earliest day (today),
    /// `NextWeek` the coming Monday, a weekday name its next occurrence after
    /// today.
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match self {
            DateReference::Today | DateReference::ThisWeek => today,
            DateReference::Tomorrow => today + Duration::days(1),
            DateReference::DayAfterTomorrow => today + Duration::days(2),
            DateReference::NextWeek => {
                let to_monday = 7 - today.weekday().num_days_from_monday() as i64;
                today + Duration::days(to_monday)
            }
            DateReference::Weekday(target) => {
                let current = today.weekday().num_days_from_monday() as i64;
                let wanted = target.num_days_from_monday() as i64;
                let mut ahead = (wanted - current).rem_euclid(7);
                if ahead == 0 {
                    ahead = 7;
                }
                today + Duration::days(ahead)
            }
            DateReference::On(date) => *date,
        }
    }
}

/// Booking parameters pulled out of one utterance. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingIntent {
    pub expert: Option<String>,
    pub date: Option<DateReference>,
    /// Zero-padded `HH:MM`.
    pub time: Option<String>,
    pub duration_minutes: Option<i64>,
}

impl BookingIntent {
    pub fn is_complete(&self) -> bool {
        self.expert.is_some() && self.date.is_some() && self.time.is_some()
    }

    pub fn duration(&self) -> i64 {
        self.duration_minutes
            .unwrap_or(DEFAULT_INTENT_DURATION_MINUTES)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Depression,
    Anxiety,
    Sleep,
    Relationship,
    Academic,
    General,
}

impl IntentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::Depression => "depression",
            IntentCategory::Anxiety => "anxiety",
            IntentCategory::Sleep => "sleep",
            IntentCategory::Relationship => "relationship",
            IntentCategory::Academic => "academic",
            IntentCategory::General => "general",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_resolve_relative_dates() {
        // 2025-03-12 is a Wednesday
        let today = date("2025-03-12");
        assert_eq!(DateReference::Today.resolve(today), today);
        assert_eq!(DateReference::Tomorrow.resolve(today), date("2025-03-13"));
        assert_eq!(DateReference::DayAfterTomorrow.resolve(today), date("2025-03-14"));
        assert_eq!(DateReference::ThisWeek.resolve(today), today);
        assert_eq!(DateReference::NextWeek.resolve(today), date("2025-03-17"));
    }

    #[test]
    fn test_resolve_weekday_is_strictly_after_today() {
        let today = date("2025-03-12");
        assert_eq!(
            DateReference::Weekday(Weekday::Fri).resolve(today),
            date("2025-03-14")
        );
        assert_eq!(
            DateReference::Weekday(Weekday::Wed).resolve(today),
            date("2025-03-19")
        );
        assert_eq!(
            DateReference::Weekday(Weekday::Mon).resolve(today),
            date("2025-03-17")
        );
    }

    #[test]
    fn test_completeness() {
        let mut intent = BookingIntent {
            time: Some("14:00".to_string()),
            ..Default::default()
        };
        assert!(!intent.is_complete());
        intent.expert = Some("Dr. Lee".to_string());
        intent.date = Some(DateReference::Tomorrow);
        assert!(intent.is_complete());
        assert_eq!(intent.duration(), DEFAULT_INTENT_DURATION_MINUTES);
    }
}
