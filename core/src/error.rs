use chrono::NaiveDate;
use thiserror::Error;

/// Terminal failure of a report generation.
///
/// Quick-access code failures never show up here: they are recovered inside
/// the chart renderer by falling back to a plain-text link.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("owner '{0}' not found")]
    NotFound(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("date range of {days} days exceeds the limit of {max} days")]
    RangeTooLong { days: usize, max: usize },

    #[error(transparent)]
    Generation(#[from] anyhow::Error),
}

impl ReportError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
