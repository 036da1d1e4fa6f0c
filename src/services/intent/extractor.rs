use chrono::NaiveDate;
use regex::Regex;

use super::lexicon::{EXPERT_CONNECTORS, NAME_STOP_WORDS, RELATIVE_DATES, TITLE_WORDS};
use crate::models::{BookingIntent, DateReference};

const MAX_NAME_WORDS: usize = 4;
const MAX_DURATION_MINUTES: i64 = 240;

/// Rule-based booking intent extraction. When a field is matched more than
/// once with different values it is left empty rather than guessed.
pub struct IntentExtractor {
    clock_time: Regex,
    hour_mark: Regex,
    at_hour: Regex,
    day_first_date: Regex,
    iso_date: Regex,
    minutes: Regex,
    hours: Regex,
    relative_dates: Vec<(Regex, DateReference)>,
}

impl IntentExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let relative_dates = RELATIVE_DATES
            .iter()
            .map(|(phrase, reference)| {
                let pattern = format!(r"\b{}\b", regex::escape(phrase).replace(' ', r"\s+"));
                Regex::new(&pattern).map(|re| (re, *reference))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            clock_time: Regex::new(r"(?i)\b([01]?\d|2[0-3]):([0-5]\d)\b(?:\s*(am|pm)\b)?")?,
            hour_mark: Regex::new(r"(?i)\b([01]?\d|2[0-3])h([0-5]\d)\b")?,
            at_hour: Regex::new(r"(?i)\bat\s+(\d{1,2})\b(?:\s*(am|pm)\b)?")?,
            day_first_date: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b")?,
            iso_date: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b")?,
            minutes: Regex::new(r"(?i)\b(\d{1,3})\s*(?:minutes|minute|mins|min)\b")?,
            hours: Regex::new(r"(?i)\b(\d)\s*(?:hours|hour|hrs|hr)\b")?,
            relative_dates,
        })
    }

    pub fn extract(&self, text: &str) -> BookingIntent {
        BookingIntent {
            expert: self.expert_reference(text),
            date: self.date_reference(text),
            time: self.time_reference(text),
            duration_minutes: self.duration_reference(text),
        }
    }

    pub fn expert_reference(&self, text: &str) -> Option<String> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let candidates: Vec<String> = tokens
            .iter()
            .enumerate()
            .filter(|(_, tok)| EXPERT_CONNECTORS.contains(&bare_word(tok).as_str()))
            .filter_map(|(i, _)| collect_name(&tokens[i + 1..]))
            .collect();
        single(candidates)
    }

    pub fn date_reference(&self, text: &str) -> Option<DateReference> {
        let mut found = vec![];

        for caps in self.day_first_date.captures_iter(text) {
            found.push(literal_date(&caps[3], &caps[2], &caps[1])?);
        }
        for caps in self.iso_date.captures_iter(text) {
            found.push(literal_date(&caps[1], &caps[2], &caps[3])?);
        }

        let mut haystack = text.to_lowercase();
        for (re, reference) in &self.relative_dates {
            let ranges: Vec<_> = re.find_iter(&haystack).map(|m| m.range()).collect();
            if ranges.is_empty() {
                continue;
            }
            found.push(*reference);
            for range in ranges {
                let blank = " ".repeat(range.len());
                haystack.replace_range(range, &blank);
            }
        }

        single(found)
    }

    /// Zero-padded `HH:MM`.
    pub fn time_reference(&self, text: &str) -> Option<String> {
        let mut found = vec![];

        for caps in self.clock_time.captures_iter(text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            found.push(format_time(hour, minute, caps.get(3).map(|m| m.as_str()))?);
        }
        for caps in self.hour_mark.captures_iter(text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            found.push(format_time(hour, minute, None)?);
        }
        for caps in self.at_hour.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let hour_end = caps.get(1).map(|m| m.end()).unwrap_or(whole.end());
            // "at 9:30", "at 9h30" and "at 10/3/2025" belong to the other patterns
            if continues_number(&text[hour_end..]) {
                continue;
            }
            let hour: u32 = caps[1].parse().ok()?;
            found.push(format_time(hour, 0, caps.get(2).map(|m| m.as_str()))?);
        }

        single(found)
    }

    pub fn duration_reference(&self, text: &str) -> Option<i64> {
        let from_minutes = self
            .minutes
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse::<i64>().ok());
        let from_hours = self
            .hours
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse::<i64>().ok().map(|h| h * 60));
        let found: Vec<i64> = from_minutes.chain(from_hours).collect();

        single(found).filter(|m| *m > 0 && *m <= MAX_DURATION_MINUTES)
    }
}

/// Returns the value if every candidate agrees, `None` if there are none or
/// they conflict.
fn single<T: PartialEq>(mut candidates: Vec<T>) -> Option<T> {
    let first = candidates.pop()?;
    if candidates.iter().all(|c| *c == first) {
        Some(first)
    } else {
        None
    }
}

fn bare_word(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn is_title(word: &str) -> bool {
    TITLE_WORDS.contains(&word)
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

/// Takes capitalised words (or a leading title) up to a delimiter, a stop
/// word, a number or a lower-case word.
fn collect_name(tokens: &[&str]) -> Option<String> {
    let mut words: Vec<String> = vec![];

    for token in tokens {
        let without_clause = token.trim_end_matches([',', ';', ':', '!', '?']);
        let word = bare_word(without_clause);

        if words.is_empty() && EXPERT_CONNECTORS.contains(&word.as_str()) {
            continue;
        }
        if word.is_empty()
            || NAME_STOP_WORDS.contains(&word.as_str())
            || without_clause.starts_with(|c: char| c.is_ascii_digit())
        {
            break;
        }

        let title = is_title(&word);
        if !title && !starts_uppercase(without_clause) {
            if words.is_empty() {
                return None;
            }
            break;
        }

        let ends_sentence = !title && without_clause.ends_with('.');
        let cleaned = if ends_sentence {
            without_clause.trim_end_matches('.')
        } else {
            without_clause
        };
        words.push(cleaned.to_string());

        let ends_clause = without_clause.len() != token.len();
        if ends_clause || ends_sentence || words.len() == MAX_NAME_WORDS {
            break;
        }
    }

    // A title on its own is not a name
    if words.iter().all(|w| is_title(&bare_word(w))) {
        return None;
    }
    Some(words.join(" "))
}

fn literal_date(year: &str, month: &str, day: &str) -> Option<DateReference> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    Some(DateReference::On(date))
}

fn continues_number(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some(':' | 'h' | 'H' | '/' | '-' | '.') => {
            chars.next().is_some_and(|c| c.is_ascii_digit())
        }
        Some(c) => c.is_ascii_digit(),
        None => false,
    }
}

fn format_time(hour: u32, minute: u32, meridiem: Option<&str>) -> Option<String> {
    let hour = match meridiem.map(str::to_ascii_lowercase).as_deref() {
        Some("am") if hour == 12 => 0,
        Some("pm") if hour < 12 => hour + 12,
        Some(_) if hour > 12 => return None,
        _ => hour,
    };
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(format!("{hour:02}:{minute:02}"))
}
