use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// One weekday's opening hours. `weekday` counts from Sunday = 0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHoursRule {
    pub weekday: u8,
    pub open_hour: u32,
    pub close_hour: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRange {
    pub open_hour: u32,
    pub close_hour: u32,
}

/// Weekly working-hours table. Weekdays without a rule are closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub rules: Vec<WorkingHoursRule>,
}

impl Default for WorkingHours {
    fn default() -> Self {
        let mut rules: Vec<WorkingHoursRule> = (1..=5)
            .map(|weekday| WorkingHoursRule {
                weekday,
                open_hour: 9,
                close_hour: 17,
            })
            .collect();
        rules.push(WorkingHoursRule {
            weekday: 6,
            open_hour: 9,
            close_hour: 12,
        });
        rules.push(WorkingHoursRule {
            weekday: 0,
            open_hour: 10,
            close_hour: 14,
        });
        Self { rules }
    }
}

impl WorkingHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: WorkingHours = serde_json::from_str(s)?;
        let mut seen = [false; 7];
        for rule in &hours.rules {
            if rule.weekday > 6 {
                return Err(anyhow::anyhow!("invalid weekday: {}", rule.weekday));
            }
            if rule.close_hour > 24 || rule.open_hour >= rule.close_hour {
                return Err(anyhow::anyhow!(
                    "invalid hours for weekday {}: {}-{}",
                    rule.weekday,
                    rule.open_hour,
                    rule.close_hour
                ));
            }
            if seen[rule.weekday as usize] {
                return Err(anyhow::anyhow!("duplicate rule for weekday {}", rule.weekday));
            }
            seen[rule.weekday as usize] = true;
        }
        Ok(hours)
    }

    /// `None` means the day is closed.
    pub fn rules_for(&self, weekday: Weekday) -> Option<OpenRange> {
        let index = weekday.num_days_from_sunday() as u8;
        self.rules
            .iter()
            .find(|rule| rule.weekday == index)
            .map(|rule| OpenRange {
                open_hour: rule.open_hour,
                close_hour: rule.close_hour,
            })
    }

    pub fn to_human_readable(&self) -> String {
        // Monday first, Sunday last
        let mut sorted = self.rules.clone();
        sorted.sort_by_key(|rule| (rule.weekday + 6) % 7);

        sorted
            .iter()
            .map(|rule| {
                format!(
                    "{}: {:02}:00-{:02}:00",
                    DAY_NAMES[rule.weekday as usize], rule.open_hour, rule.close_hour
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
