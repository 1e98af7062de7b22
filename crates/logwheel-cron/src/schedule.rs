//! Parsed schedule and due-time detection.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, Timelike};
use tracing::debug;

use crate::ScheduleError;
use crate::field::FIELDS;

/// Wall-clock minute a schedule last fired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FiredAt {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    weekday: u32,
}

impl FiredAt {
    fn of<T: Datelike + Timelike>(now: &T) -> Self {
        Self {
            year: now.year(),
            month: now.month0(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            weekday: now.weekday().num_days_from_sunday(),
        }
    }
}

/// A five-field schedule (`minute hour day month weekday`).
///
/// A default schedule is empty and never due; [`Schedule::parse`] fills it.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    expression: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days: BTreeSet<u32>,
    months: BTreeSet<u32>,
    weekdays: BTreeSet<u32>,
    last_fired: Option<FiredAt>,
}

impl Schedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `expression` into this schedule.
    ///
    /// All-or-nothing: on error every field is left empty.
    pub fn parse(&mut self, expression: &str) -> Result<(), ScheduleError> {
        *self = Self::default();

        let [minutes, hours, days, months, weekdays] = parse_fields(expression)?;
        self.expression = expression.trim().to_string();
        self.minutes = minutes;
        self.hours = hours;
        self.days = days;
        self.months = months;
        self.weekdays = weekdays;
        Ok(())
    }

    /// The trimmed expression this schedule was parsed from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn minutes(&self) -> &BTreeSet<u32> {
        &self.minutes
    }

    pub fn hours(&self) -> &BTreeSet<u32> {
        &self.hours
    }

    pub fn days(&self) -> &BTreeSet<u32> {
        &self.days
    }

    /// Zero-based months.
    pub fn months(&self) -> &BTreeSet<u32> {
        &self.months
    }

    /// Weekdays, `0` = Sunday.
    pub fn weekdays(&self) -> &BTreeSet<u32> {
        &self.weekdays
    }

    /// Whether every field holds at least one value.
    pub fn is_parsed(&self) -> bool {
        !(self.minutes.is_empty()
            || self.hours.is_empty()
            || self.days.is_empty()
            || self.months.is_empty()
            || self.weekdays.is_empty())
    }

    /// Whether `now` falls inside all five fields, ignoring de-duplication.
    pub fn matches<T: Datelike + Timelike>(&self, now: &T) -> bool {
        self.minutes.contains(&now.minute())
            && self.hours.contains(&now.hour())
            && self.days.contains(&now.day())
            && self.months.contains(&now.month0())
            && self.weekdays.contains(&now.weekday().num_days_from_sunday())
    }

    /// Returns `true` at most once per matching wall-clock minute.
    pub fn is_due<T: Datelike + Timelike>(&mut self, now: &T) -> bool {
        if !self.matches(now) {
            return false;
        }

        let current = FiredAt::of(now);
        if self.last_fired == Some(current) {
            debug!(
                schedule = %self.expression,
                minute = current.minute,
                "Schedule already fired this minute"
            );
            return false;
        }

        self.last_fired = Some(current);
        true
    }

    /// [`Schedule::is_due`] against the local wall clock.
    pub fn is_due_now(&mut self) -> bool {
        self.is_due(&Local::now())
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut schedule = Schedule::new();
        schedule.parse(s)?;
        Ok(schedule)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn parse_fields(expression: &str) -> Result<[BTreeSet<u32>; 5], ScheduleError> {
    let tokens: Vec<&str> = expression.split_whitespace().collect();
    if tokens.len() != FIELDS.len() {
        return Err(ScheduleError::FieldCount(tokens.len()));
    }

    let mut sets: [BTreeSet<u32>; 5] = Default::default();
    for ((spec, token), set) in FIELDS.iter().zip(&tokens).zip(sets.iter_mut()) {
        *set = spec.parse_token(token)?;
    }

    if let Some((spec, _)) = FIELDS.iter().zip(&sets).find(|(_, set)| set.is_empty()) {
        return Err(ScheduleError::EmptyField { field: spec.name });
    }

    Ok(sets)
}
