//! # Cron expressions
//!
//! Five fields, `minute hour day-of-month month day-of-week`, evaluated in
//! UTC. Each field accepts `*`, single values, ranges (`1-5`), lists
//! (`1,15,30`) and steps (`*/15`, `10-50/10`, `5/20`). Day-of-week runs
//! 0-6 from Sunday; 7 is accepted as Sunday too.
//!
//! When both day fields are restricted a time matches if either does, as in
//! classic cron.

use anima_core::{AnimaError, Result};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Longest span `next_after` searches: two leap-year cycles, so Feb 29
/// schedules always find their next occurrence
const MAX_LOOKAHEAD_DAYS: i64 = 366 * 8;

/// Parsed cron expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronExpression {
    /// Original expression
    pub expression: String,

    /// Minutes (0-59)
    pub minutes: Vec<u8>,

    /// Hours (0-23)
    pub hours: Vec<u8>,

    /// Days of month (1-31)
    pub days_of_month: Vec<u8>,

    /// Months (1-12)
    pub months: Vec<u8>,

    /// Days of week (0-6, 0=Sunday)
    pub days_of_week: Vec<u8>,

    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    /// Parse a cron expression
    pub fn parse(expression: &str) -> Result<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();

        if parts.len() != 5 {
            return Err(invalid(
                expression,
                "expected 5 fields (minute hour day month weekday)",
            ));
        }

        let mut days_of_week = Self::parse_field(expression, parts[4], 0, 7)?;
        if days_of_week.contains(&7) {
            days_of_week.retain(|d| *d != 7);
            days_of_week.push(0);
            days_of_week.sort_unstable();
            days_of_week.dedup();
        }

        Ok(Self {
            expression: expression.to_string(),
            minutes: Self::parse_field(expression, parts[0], 0, 59)?,
            hours: Self::parse_field(expression, parts[1], 0, 23)?,
            days_of_month: Self::parse_field(expression, parts[2], 1, 31)?,
            months: Self::parse_field(expression, parts[3], 1, 12)?,
            days_of_week,
            dom_restricted: parts[2] != "*",
            dow_restricted: parts[4] != "*",
        })
    }

    fn parse_field(expression: &str, field: &str, min: u8, max: u8) -> Result<Vec<u8>> {
        let number = |s: &str| -> Result<u8> {
            s.parse::<u8>()
                .map_err(|_| invalid(expression, &format!("'{}' is not a number", s)))
        };

        let mut values = Vec::new();

        for part in field.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step = number(step)?;
                    if step == 0 {
                        return Err(invalid(expression, "step must be at least 1"));
                    }
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((start, end)) = range.split_once('-') {
                (number(start)?, number(end)?)
            } else {
                let value = number(range)?;
                // `5/20` means "from 5, every 20"
                if step.is_some() {
                    (value, max)
                } else {
                    (value, value)
                }
            };

            if start < min || end > max || start > end {
                return Err(invalid(
                    expression,
                    &format!("'{}' outside {}-{}", part, min, max),
                ));
            }

            values.extend((start..=end).step_by(step.unwrap_or(1) as usize));
        }

        values.sort_unstable();
        values.dedup();
        Ok(values)
    }

    /// Check if the expression matches a given time (seconds ignored)
    pub fn matches(&self, time: &DateTime<Utc>) -> bool {
        self.minutes.contains(&(time.minute() as u8))
            && self.hours.contains(&(time.hour() as u8))
            && self.months.contains(&(time.month() as u8))
            && self.day_matches(time)
    }

    fn day_matches(&self, time: &DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(&(time.day() as u8));
        let dow = self
            .days_of_week
            .contains(&(time.weekday().num_days_from_sunday() as u8));

        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// First matching minute strictly after `after`, searching at most eight
    /// years ahead
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.timestamp();
        let mut candidate = start - start.rem_euclid(60) + 60;
        let limit = start + Duration::days(MAX_LOOKAHEAD_DAYS).num_seconds();

        while candidate <= limit {
            let time = DateTime::<Utc>::from_timestamp(candidate, 0)?;

            if !self.months.contains(&(time.month() as u8)) || !self.day_matches(&time) {
                candidate = candidate - candidate.rem_euclid(86_400) + 86_400;
                continue;
            }
            if !self.hours.contains(&(time.hour() as u8)) {
                candidate = candidate - candidate.rem_euclid(3_600) + 3_600;
                continue;
            }
            if self.minutes.contains(&(time.minute() as u8)) {
                return Some(time);
            }
            candidate += 60;
        }
        None
    }
}

impl std::str::FromStr for CronExpression {
    type Err = AnimaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for CronExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

fn invalid(expression: &str, reason: &str) -> AnimaError {
    AnimaError::validation(format!(
        "Invalid cron expression '{}': {}",
        expression, reason
    ))
}
