//! Timestamp wrapper
//!
//! Stored in UTC, always serialized as `YYYY-MM-DDTHH:MM:SSZ`, displayed in
//! local time.

use std::fmt;
use std::ops::{Add, Sub};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::Value as Json;
use tracing::debug;

use crate::duration::Duration;
use crate::error::DocError;
use crate::value::{Typed, ValueKind};

/// Wire format for timestamps
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The tracker's compact ISO-8601 form
const COMPACT_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Local display format
const DISPLAY_FORMAT: &str = "%d %b %Y %H:%M:%S %Z";

/// A timestamp field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(DateTime<Utc>);

impl Date {
    pub const MIN: Date = Date(DateTime::<Utc>::MIN_UTC);
    pub const MAX: Date = Date(DateTime::<Utc>::MAX_UTC);

    /// The current time, truncated to whole seconds
    pub fn now() -> Self {
        Self::from(Utc::now()).truncated()
    }

    pub fn get(self) -> DateTime<Utc> {
        self.0
    }

    /// This timestamp in the local timezone
    pub fn local(self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    /// Parse an ISO-8601 timestamp string
    ///
    /// Strings without an offset are taken as local time.
    pub fn parse_str(s: &str) -> Result<Self, DocError> {
        debug!(s, "Date::parse_str: called");
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::from(dt));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, COMPACT_FORMAT) {
            return Ok(Self(Utc.from_utc_datetime(&naive)));
        }
        if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
            return Ok(Self::from(dt));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Self::from_local(naive, s);
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Self::from_local(date.and_time(chrono::NaiveTime::MIN), s);
        }
        Err(DocError::invalid(ValueKind::Date, s, "not an ISO-8601 timestamp"))
    }

    fn from_local(naive: NaiveDateTime, original: &str) -> Result<Self, DocError> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(Self::from)
            .ok_or_else(|| DocError::invalid(ValueKind::Date, original, "does not exist in the local timezone"))
    }

    /// Add a duration, failing if the result leaves chrono's date range
    pub fn checked_add(self, rhs: Duration) -> Result<Self, DocError> {
        rhs.to_timedelta()
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
            .ok_or_else(|| out_of_range(self, "+", rhs))
    }

    /// Subtract a duration, failing if the result leaves chrono's date range
    pub fn checked_sub(self, rhs: Duration) -> Result<Self, DocError> {
        rhs.to_timedelta()
            .and_then(|delta| self.0.checked_sub_signed(delta))
            .map(Self)
            .ok_or_else(|| out_of_range(self, "-", rhs))
    }

    /// Drop any sub-second component, which the wire format cannot carry
    pub fn truncated(self) -> Self {
        Self(self.0.with_nanosecond(0).unwrap_or(self.0))
    }
}

fn out_of_range(date: Date, op: &str, rhs: Duration) -> DocError {
    let value = format!("{} {} {}", date.0.format(WIRE_FORMAT), op, rhs);
    DocError::invalid(ValueKind::Date, value, "out of range")
}

impl Typed for Date {
    const KIND: ValueKind = ValueKind::Date;

    fn parse(json: &Json) -> Result<Self, DocError> {
        match json {
            Json::String(s) => Self::parse_str(s),
            other => Err(DocError::mismatch(Self::KIND, "string", other)),
        }
    }

    fn serialize(&self) -> Result<Json, DocError> {
        Ok(Json::String(self.0.format(WIRE_FORMAT).to_string()))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.local().format(DISPLAY_FORMAT))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Date {
    fn from(value: DateTime<Tz>) -> Self {
        Self(value.with_timezone(&Utc))
    }
}

// The operators clamp to chrono's date range; use checked_add and
// checked_sub where the duration comes from user data

impl Add<Duration> for Date {
    type Output = Date;

    fn add(self, rhs: Duration) -> Date {
        self.checked_add(rhs).unwrap_or(if rhs.is_negative() { Date::MIN } else { Date::MAX })
    }
}

impl Sub<Duration> for Date {
    type Output = Date;

    fn sub(self, rhs: Duration) -> Date {
        self.checked_sub(rhs).unwrap_or(if rhs.is_negative() { Date::MAX } else { Date::MIN })
    }
}

impl Sub<Date> for Date {
    type Output = Duration;

    fn sub(self, rhs: Date) -> Duration {
        Duration::from(self.0 - rhs.0)
    }
}
