//! logwheel-cron: Schedule parsing and due-time detection.
//!
//! A schedule is a five-field cron-like expression
//! (`minute hour day month weekday`). Months are zero-based (`0` = January)
//! and weekdays start at `0` = Sunday.

pub mod field;
pub mod schedule;

use thiserror::Error;

pub use schedule::Schedule;

/// Reasons a schedule expression is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("expected 5 fields (minute hour day month weekday), got {0}")]
    FieldCount(usize),
    #[error("invalid {field} token '{token}'")]
    InvalidToken { field: &'static str, token: String },
    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("empty element in {field} list '{token}'")]
    EmptyListElement { field: &'static str, token: String },
    #[error("step must be positive in {field} token '{token}'")]
    ZeroStep { field: &'static str, token: String },
    #[error("{field} field matches no values")]
    EmptyField { field: &'static str },
}
