//! Duration wrapper
//!
//! Durations follow the tracker's own model: a signed whole number of
//! seconds. Calendar units are converted to a fixed number of days on parse
//! (`P1M` becomes `P30D`), so that information is lost.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use regex::Regex;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::DocError;
use crate::value::{Typed, ValueKind};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;
const DAYS_PER_WEEK: i64 = 7;
const DAYS_PER_MONTH: i64 = 30;
const DAYS_PER_YEAR: i64 = 365;

const DURATION_PATTERN: &str = r"^P(?:(?P<y>-?\d+)Y)?(?:(?P<mo>-?\d+)M)?(?:(?P<w>-?\d+)W)?(?:(?P<d>-?\d+)D)?(?:T(?:(?P<h>-?\d+)H)?(?:(?P<mi>-?\d+)M)?(?:(?P<s>-?\d+)S)?)?$";

/// A duration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    seconds: i64,
}

impl Duration {
    pub const ZERO: Duration = Duration { seconds: 0 };

    pub const fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    /// Saturates at the ends of the `i64` range
    pub const fn from_days(days: i64) -> Self {
        Self {
            seconds: days.saturating_mul(SECONDS_PER_DAY),
        }
    }

    /// Total length in seconds
    pub fn as_seconds(self) -> i64 {
        self.seconds
    }

    /// Whole days, truncated toward zero
    pub fn days(self) -> i64 {
        self.seconds / SECONDS_PER_DAY
    }

    /// Seconds left over after whole days, same sign as the duration
    pub fn sub_day_seconds(self) -> i64 {
        self.seconds % SECONDS_PER_DAY
    }

    pub fn is_negative(self) -> bool {
        self.seconds < 0
    }

    /// True if this duration is a whole number of days
    pub fn is_whole_days(self) -> bool {
        self.sub_day_seconds() == 0
    }

    /// `None` if chrono cannot represent this many seconds
    pub fn to_timedelta(self) -> Option<chrono::TimeDelta> {
        chrono::TimeDelta::try_seconds(self.seconds)
    }

    pub fn checked_add(self, rhs: Duration) -> Option<Duration> {
        self.seconds.checked_add(rhs.seconds).map(Self::from_seconds)
    }

    pub fn checked_sub(self, rhs: Duration) -> Option<Duration> {
        self.seconds.checked_sub(rhs.seconds).map(Self::from_seconds)
    }

    pub fn checked_neg(self) -> Option<Duration> {
        self.seconds.checked_neg().map(Self::from_seconds)
    }

    /// Parse the tracker's duration grammar, or a bare number of seconds
    pub fn parse_str(s: &str) -> Result<Self, DocError> {
        debug!(s, "Duration::parse_str: called");
        let pattern = Regex::new(DURATION_PATTERN).map_err(|e| DocError::invalid(ValueKind::Duration, s, e))?;
        if let Some(caps) = pattern.captures(s) {
            // Every component is optional, but a bare `P` or `...T` says nothing
            if s == "P" || s.ends_with('T') {
                return Err(DocError::invalid(ValueKind::Duration, s, "no components"));
            }
            let component = |name: &str| -> Result<i64, DocError> {
                match caps.name(name) {
                    Some(m) => m
                        .as_str()
                        .parse::<i64>()
                        .map_err(|e| DocError::invalid(ValueKind::Duration, s, e)),
                    None => Ok(0),
                }
            };
            let out_of_range = || DocError::invalid(ValueKind::Duration, s, "out of range");
            let mut days: i64 = 0;
            for (name, unit) in [("y", DAYS_PER_YEAR), ("mo", DAYS_PER_MONTH), ("w", DAYS_PER_WEEK), ("d", 1)] {
                days = component(name)?
                    .checked_mul(unit)
                    .and_then(|n| days.checked_add(n))
                    .ok_or_else(out_of_range)?;
            }
            let mut seconds = days.checked_mul(SECONDS_PER_DAY).ok_or_else(out_of_range)?;
            for (name, unit) in [("h", SECONDS_PER_HOUR), ("mi", SECONDS_PER_MINUTE), ("s", 1)] {
                seconds = component(name)?
                    .checked_mul(unit)
                    .and_then(|n| seconds.checked_add(n))
                    .ok_or_else(out_of_range)?;
            }
            return Ok(Self { seconds });
        }

        // `task edit` writes durations back as a plain count of seconds
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<i64>()
                .map(Self::from_seconds)
                .map_err(|e| DocError::invalid(ValueKind::Duration, s, e));
        }

        Err(DocError::invalid(ValueKind::Duration, s, "not an ISO-8601 duration"))
    }
}

impl Typed for Duration {
    const KIND: ValueKind = ValueKind::Duration;

    fn parse(json: &Json) -> Result<Self, DocError> {
        match json {
            Json::String(s) => Self::parse_str(s),
            other => Err(DocError::mismatch(Self::KIND, "string", other)),
        }
    }

    fn serialize(&self) -> Result<Json, DocError> {
        Ok(Json::String(self.to_string()))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds == 0 {
            return f.write_str("PT0S");
        }

        let sign = if self.seconds < 0 { "-" } else { "" };
        let mut rest = self.seconds.unsigned_abs();
        let day = SECONDS_PER_DAY as u64;
        let hour = SECONDS_PER_HOUR as u64;
        let minute = SECONDS_PER_MINUTE as u64;

        let days = rest / day;
        rest %= day;
        let hours = rest / hour;
        rest %= hour;
        let minutes = rest / minute;
        let seconds = rest % minute;

        f.write_str("P")?;
        if days > 0 {
            write!(f, "{}{}D", sign, days)?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 {
            f.write_str("T")?;
            for (unit, n) in [("H", hours), ("M", minutes), ("S", seconds)] {
                if n > 0 {
                    write!(f, "{}{}{}", sign, n, unit)?;
                }
            }
        }
        Ok(())
    }
}

impl From<chrono::TimeDelta> for Duration {
    fn from(value: chrono::TimeDelta) -> Self {
        Self {
            seconds: value.num_seconds(),
        }
    }
}

// The operators saturate; use the checked_* methods to detect overflow

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::from_seconds(self.seconds.saturating_add(rhs.seconds))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_seconds(self.seconds.saturating_sub(rhs.seconds))
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration::from_seconds(self.seconds.saturating_neg())
    }
}
