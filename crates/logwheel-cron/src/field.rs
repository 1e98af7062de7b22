//! Per-field descriptors and token parsing.
//!
//! Every position of a schedule is described by a [`FieldSpec`]; one generic
//! parser handles `*`, bare values, lists, ranges and steps for all of them.

use std::collections::BTreeSet;

use crate::ScheduleError;

/// Bounds of a single schedule field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name used in error messages.
    pub name: &'static str,
    /// Smallest valid value.
    pub min: u32,
    /// Largest valid value.
    pub max: u32,
    /// Start value for `*/step`.
    pub start: u32,
}

pub const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    start: 0,
};

pub const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    start: 0,
};

pub const DAY: FieldSpec = FieldSpec {
    name: "day",
    min: 1,
    max: 31,
    start: 1,
};

/// Zero-based: `0` is January.
pub const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 0,
    max: 11,
    start: 0,
};

/// `0` is Sunday.
pub const WEEKDAY: FieldSpec = FieldSpec {
    name: "weekday",
    min: 0,
    max: 6,
    start: 0,
};

/// Field descriptors in expression order.
pub const FIELDS: [FieldSpec; 5] = [MINUTE, HOUR, DAY, MONTH, WEEKDAY];

impl FieldSpec {
    pub fn contains(&self, value: u32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Parse one whitespace-free token into the set of values it selects.
    ///
    /// A descending range (`5-3`) selects nothing; whether that is an error
    /// is decided by the caller once all fields are known.
    pub fn parse_token(&self, token: &str) -> Result<BTreeSet<u32>, ScheduleError> {
        if token == "*" {
            return Ok((self.min..=self.max).collect());
        }

        if token.contains(',') {
            let mut values = BTreeSet::new();
            for element in token.split(',') {
                if element.is_empty() {
                    return Err(ScheduleError::EmptyListElement {
                        field: self.name,
                        token: token.to_string(),
                    });
                }
                values.insert(self.value(element, token)?);
            }
            return Ok(values);
        }

        if let Some((from, to)) = token.split_once('-') {
            let from = self.value(from, token)?;
            let to = self.value(to, token)?;
            return Ok((from..=to).collect());
        }

        if let Some((from, step)) = token.split_once('/') {
            let from = if from == "*" {
                self.start
            } else {
                self.value(from, token)?
            };
            let step = parse_number(step).ok_or_else(|| self.invalid(token))?;
            if step == 0 {
                return Err(ScheduleError::ZeroStep {
                    field: self.name,
                    token: token.to_string(),
                });
            }
            return Ok((from..=self.max).step_by(step as usize).collect());
        }

        Ok(BTreeSet::from([self.value(token, token)?]))
    }

    /// Parse a bare integer and check it against the field bounds.
    fn value(&self, text: &str, token: &str) -> Result<u32, ScheduleError> {
        let value = parse_number(text).ok_or_else(|| self.invalid(token))?;
        if !self.contains(value) {
            return Err(ScheduleError::OutOfRange {
                field: self.name,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value)
    }

    fn invalid(&self, token: &str) -> ScheduleError {
        ScheduleError::InvalidToken {
            field: self.name,
            token: token.to_string(),
        }
    }
}

/// Digits only; signs, blanks and overflowing values are rejected.
fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
