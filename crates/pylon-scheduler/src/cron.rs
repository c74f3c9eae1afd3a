//! Five-field cron expression parsing and evaluation.
//!
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day of month (1-31)
//! │ │ │ ┌───────────── month (1-12)
//! │ │ │ │ ┌───────────── day of week (0-6, 0 = Sunday)
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! Each field accepts `*`, a single value, a comma list, an inclusive range
//! `a-b`, or a step `*/n` / `a-b/n`. Day-of-month and day-of-week follow
//! standard cron semantics: when both are restricted they combine with OR,
//! otherwise the restricted side (if any) decides alone.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::SchedulerError;

/// Forward-search horizon for [`CronExpression::next_after`]: four years of
/// minutes covers every leap-year/day-of-week alignment that can occur.
const SEARCH_HORIZON_DAYS: i64 = 4 * 366;

/// One field of a cron expression, expanded to its matching value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    values: BTreeSet<u32>,
    min: u32,
    max: u32,
    /// False only for a bare `*` — the distinction drives the
    /// day-of-month/day-of-week OR rule.
    restricted: bool,
}

impl CronField {
    fn parse(name: &'static str, expr: &str, min: u32, max: u32) -> Result<Self, SchedulerError> {
        let mut field = Self {
            values: BTreeSet::new(),
            min,
            max,
            restricted: expr != "*",
        };
        for part in expr.split(',') {
            field.parse_part(name, part.trim())?;
        }
        Ok(field)
    }

    fn parse_part(&mut self, name: &'static str, part: &str) -> Result<(), SchedulerError> {
        let invalid = |value: &str| SchedulerError::InvalidCronField {
            field: name,
            value: value.to_string(),
        };
        if part.is_empty() {
            return Err(invalid(part));
        }

        // Split off a step suffix (e.g. "*/5", "10-40/5").
        let (range_part, step) = match part.split_once('/') {
            Some((range, step_str)) => {
                let step = step_str.parse::<u32>().map_err(|_| invalid(part))?;
                if step == 0 {
                    return Err(invalid(part));
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range_part == "*" {
            (self.min, self.max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            let start = a.parse::<u32>().map_err(|_| invalid(part))?;
            let end = b.parse::<u32>().map_err(|_| invalid(part))?;
            if start > end {
                return Err(invalid(part));
            }
            (start, end)
        } else {
            let value = range_part.parse::<u32>().map_err(|_| invalid(part))?;
            (value, value)
        };

        if start < self.min || end > self.max {
            return Err(invalid(part));
        }

        let mut value = start;
        while value <= end {
            self.values.insert(value);
            value += step;
        }
        Ok(())
    }

    fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }
}

/// A parsed, immediately evaluable cron expression.
///
/// Serializes as its normalized expression string, both over the API and
/// into the `schedules` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    expression: String,
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronExpression {
    /// Parse a five-field expression. Errors name the offending field and
    /// the value that failed to parse.
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(SchedulerError::InvalidCronFieldCount(parts.len()));
        }

        Ok(Self {
            expression: parts.join(" "),
            minute: CronField::parse("minute", parts[0], 0, 59)?,
            hour: CronField::parse("hour", parts[1], 0, 23)?,
            day_of_month: CronField::parse("day-of-month", parts[2], 1, 31)?,
            month: CronField::parse("month", parts[3], 1, 12)?,
            day_of_week: CronField::parse("day-of-week", parts[4], 0, 6)?,
        })
    }

    /// The normalized source expression ("m h dom mon dow").
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether `instant` (truncated to the minute) satisfies the expression.
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        self.minute.matches(instant.minute())
            && self.hour.matches(instant.hour())
            && self.month.matches(instant.month())
            && self.day_matches(instant)
    }

    /// Standard cron day rule: both restricted → OR; one restricted → that
    /// side; neither → always true.
    fn day_matches(&self, instant: DateTime<Utc>) -> bool {
        let dom = self.day_of_month.matches(instant.day());
        let dow = self
            .day_of_week
            .matches(instant.weekday().num_days_from_sunday());
        match (self.day_of_month.restricted, self.day_of_week.restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Earliest minute-aligned instant strictly after `instant` satisfying
    /// [`matches`](Self::matches).
    ///
    /// Scans forward at minute granularity, skipping whole days and months
    /// that cannot match. Expressions with no occurrence within four years
    /// (e.g. `0 0 30 2 *`) yield [`SchedulerError::UnsatisfiableCron`].
    pub fn next_after(&self, instant: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulerError> {
        let mut current = truncate_to_minute(instant) + Duration::minutes(1);
        let horizon = current + Duration::days(SEARCH_HORIZON_DAYS);

        while current < horizon {
            if !self.month.matches(current.month()) {
                current = start_of_next_month(current);
                continue;
            }
            if !self.day_matches(current) {
                current = start_of_next_day(current);
                continue;
            }
            if self.matches(current) {
                return Ok(current);
            }
            current += Duration::minutes(1);
        }

        Err(SchedulerError::UnsatisfiableCron(self.expression.clone()))
    }
}

impl FromStr for CronExpression {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronExpression::parse(s)
    }
}

impl std::fmt::Display for CronExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

impl Serialize for CronExpression {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

impl<'de> Deserialize<'de> for CronExpression {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        CronExpression::parse(&text).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(
        instant.year(),
        instant.month(),
        instant.day(),
        instant.hour(),
        instant.minute(),
        0,
    )
    .single()
    .unwrap_or(instant)
}

fn start_of_next_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    let next = instant.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

fn start_of_next_month(instant: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if instant.month() == 12 {
        (instant.year() + 1, 1)
    } else {
        (instant.year(), instant.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("first of month is valid")
}
