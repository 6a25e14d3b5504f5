//! Parsing and normalization of the START/END command-line timestamps.
//!
//! Both bounds are naive (zone-less) timestamps in the recorder's own clock.
//! A bound is accepted as a bare date or as a date-time with minute or second
//! precision; a space may replace the `T` separator. Bare dates expand to
//! the first second of the day for START and the last second of the day for
//! END, so `2025-05-08 .. 2025-05-08` covers that whole day.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

/// Date-only input format.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date-time input formats, tried in order after [`DATE_FORMAT`].
const DATE_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Timestamp format of `startTime`/`endTime` in a CMSearch request.
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Which end of the span a value was given for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// The START argument.
    Start,
    /// The END argument.
    End,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Start => f.write_str("start"),
            Bound::End => f.write_str("end"),
        }
    }
}

/// Command-line values rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A START/END value matched none of the accepted formats.
    #[error("invalid {bound} time '{input}': expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]")]
    InvalidTimestamp {
        /// Which argument was malformed.
        bound: Bound,
        /// The raw argument text.
        input: String,
    },

    /// END resolved to an instant before START.
    #[error("end time {end} is before start time {start}")]
    EndBeforeStart {
        /// The normalized start.
        start: NaiveDateTime,
        /// The normalized end.
        end: NaiveDateTime,
    },

    /// HOST does not form a usable URL authority.
    #[error("invalid host '{host}': {reason}")]
    InvalidHost {
        /// The raw host argument.
        host: String,
        /// Why URL construction rejected it.
        reason: String,
    },
}

/// A validated, inclusive search window.
///
/// Invariant: `start <= end`. Only constructible through [`TimeSpan::new`]
/// or [`TimeSpan::parse`], both of which enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeSpan {
    /// Builds a span from already-normalized bounds.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::EndBeforeStart { start, end });
        }
        Ok(TimeSpan { start, end })
    }

    /// Parses and normalizes the raw START and END arguments.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        let start = parse_bound(start, Bound::Start)?;
        let end = parse_bound(end, Bound::End)?;
        TimeSpan::new(start, end)
    }

    /// First instant of the window.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Last instant of the window (inclusive).
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// `startTime` as sent to the device.
    pub fn wire_start(&self) -> String {
        self.start.format(WIRE_FORMAT).to_string()
    }

    /// `endTime` as sent to the device.
    ///
    /// The recorder treats `endTime` as exclusive, so the inclusive end is
    /// pushed forward by one second.
    pub fn wire_end(&self) -> String {
        let exclusive = self
            .end
            .checked_add_signed(TimeDelta::seconds(1))
            .unwrap_or(self.end);
        exclusive.format(WIRE_FORMAT).to_string()
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {}",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

/// Parses one START/END argument.
///
/// A bare date becomes `00:00:00` for [`Bound::Start`] and `23:59:59` for
/// [`Bound::End`]. Date-times without seconds get `:00`.
pub fn parse_bound(input: &str, bound: Bound) -> Result<NaiveDateTime, ValidationError> {
    let trimmed = input.trim();
    let invalid = || ValidationError::InvalidTimestamp {
        bound,
        input: input.to_string(),
    };

    if !has_timestamp_shape(trimmed) {
        return Err(invalid());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, DATE_FORMAT) {
        let expanded = match bound {
            Bound::Start => date.and_hms_opt(0, 0, 0),
            Bound::End => date.and_hms_opt(23, 59, 59),
        };
        return expanded.ok_or_else(invalid);
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(invalid)
}

/// Checks the fixed-width layout `YYYY-MM-DD[(T| )HH:MM[:SS]]`.
///
/// chrono alone accepts one-digit fields and signed years, so the shape is
/// enforced byte by byte first; chrono then checks the calendar.
fn has_timestamp_shape(value: &str) -> bool {
    let bytes = value.as_bytes();
    if !matches!(bytes.len(), 10 | 16 | 19) {
        return false;
    }
    bytes.iter().enumerate().all(|(i, &b)| match i {
        4 | 7 => b == b'-',
        10 => b == b'T' || b == b' ',
        13 | 16 => b == b':',
        _ => b.is_ascii_digit(),
    })
}
