use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::{OpenRange, TimeSlot, WorkingHours};

pub const DEFAULT_SLOT_MINUTES: i64 = 60;

/// One slot per whole hour in `[open, close)`, keeping only those that start
/// strictly after `now`. A closed day yields nothing.
pub fn generate_slots(
    date: NaiveDate,
    rule: Option<OpenRange>,
    now: NaiveDateTime,
) -> Vec<TimeSlot> {
    let Some(range) = rule else {
        return vec![];
    };

    (range.open_hour..range.close_hour)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .map(|time| date.and_time(time))
        .filter(|start| *start > now)
        .map(|start| TimeSlot::new(start, DEFAULT_SLOT_MINUTES))
        .collect()
}

pub fn slots_for_date(date: NaiveDate, hours: &WorkingHours, now: NaiveDateTime) -> Vec<TimeSlot> {
    generate_slots(date, hours.rules_for(date.weekday()), now)
}
