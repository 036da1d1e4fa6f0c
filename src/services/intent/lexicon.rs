//! Keyword tables used by the extractor, the classifier and the chat triggers.

use chrono::Weekday;

use crate::models::{DateReference, IntentCategory};

pub const EXPERT_CONNECTORS: &[&str] = &["with", "consultant"];

/// Honorifics allowed to open an expert name even though they may be lower case.
pub const TITLE_WORDS: &[&str] = &[
    "dr", "doctor", "mr", "mrs", "ms", "miss", "prof", "professor", "counselor", "counsellor",
    "therapist", "expert",
];

/// Words that end an expert reference.
pub const NAME_STOP_WORDS: &[&str] = &[
    "at", "on", "for", "in", "from", "to", "about", "around", "this", "next", "today", "tonight",
    "tomorrow", "day", "and", "or", "please", "because", "so", "but", "monday", "tuesday",
    "wednesday", "thursday", "friday", "saturday", "sunday",
];

/// Checked in order; a matched phrase is blanked out before later entries run,
/// so "day after tomorrow" never also counts as "tomorrow".
pub const RELATIVE_DATES: &[(&str, DateReference)] = &[
    ("day after tomorrow", DateReference::DayAfterTomorrow),
    ("today", DateReference::Today),
    ("tonight", DateReference::Today),
    ("tomorrow", DateReference::Tomorrow),
    ("this week", DateReference::ThisWeek),
    ("next week", DateReference::NextWeek),
    ("monday", DateReference::Weekday(Weekday::Mon)),
    ("tuesday", DateReference::Weekday(Weekday::Tue)),
    ("wednesday", DateReference::Weekday(Weekday::Wed)),
    ("thursday", DateReference::Weekday(Weekday::Thu)),
    ("friday", DateReference::Weekday(Weekday::Fri)),
    ("saturday", DateReference::Weekday(Weekday::Sat)),
    ("sunday", DateReference::Weekday(Weekday::Sun)),
];

pub const BOOKING_WORDS: &[&str] = &[
    "book",
    "booking",
    "appointment",
    "schedule",
    "reserve",
    "consultation",
    "session with",
    "meet with",
    "see an expert",
    "talk to an expert",
];

pub const URGENT_WORDS: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "end my life",
    "want to die",
    "self-harm",
    "self harm",
    "hurt myself",
    "hopeless",
    "can't go on",
    "cannot go on",
    "panic attack",
    "emergency",
];

/// Order matters: on a tied score the earlier bucket wins.
pub const CATEGORY_KEYWORDS: &[(IntentCategory, &[&str])] = &[
    (
        IntentCategory::Depression,
        &["depressed", "depression", "sad", "empty", "worthless", "no motivation", "crying"],
    ),
    (
        IntentCategory::Anxiety,
        &["anxiety", "anxious", "worried", "worry", "panic", "nervous", "stress", "stressed"],
    ),
    (
        IntentCategory::Sleep,
        &["sleep", "insomnia", "can't sleep", "nightmare", "tired", "exhausted"],
    ),
    (
        IntentCategory::Relationship,
        &["relationship", "boyfriend", "girlfriend", "breakup", "family", "friend", "lonely"],
    ),
    (
        IntentCategory::Academic,
        &["exam", "study", "studies", "grades", "school", "university", "thesis", "homework"],
    ),
];

/// Word-bounded, case-insensitive phrase search. `haystack` must already be
/// lower case.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

pub fn matches_any(text: &str, phrases: &[&str]) -> bool {
    let lower = text.to_lowercase();
    phrases.iter().any(|p| contains_phrase(&lower, p))
}
