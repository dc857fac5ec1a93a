//! Time stamps and durations in 100 ns ticks
//!
//! `DateTime` counts ticks since 1970-01-01T00:00:00Z. The two extreme raw
//! values stand for the beginning and the end of time; moving one tick
//! before or after them leaves them unchanged.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{SecondsFormat, TimeZone, Utc};
use errors::RelvalError;
use serde::{Deserialize, Serialize};

/// Ticks per second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

const NANOS_PER_TICK: i64 = 100;

/// Point in time as a raw tick count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateTime(i64);

impl DateTime {
    pub const BEGINNING_OF_TIME: DateTime = DateTime(i64::MIN);
    pub const END_OF_TIME: DateTime = DateTime(i64::MAX);
    pub const EPOCH: DateTime = DateTime(0);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(TICKS_PER_SECOND))
    }

    pub fn now() -> Self {
        Self::from_chrono(&Utc::now()).unwrap_or(Self::EPOCH)
    }

    pub fn is_infinite(self) -> bool {
        self == Self::BEGINNING_OF_TIME || self == Self::END_OF_TIME
    }

    /// One tick earlier
    pub fn before(self) -> Self {
        if self.is_infinite() {
            self
        } else {
            Self(self.0 - 1)
        }
    }

    /// One tick later
    pub fn after(self) -> Self {
        if self.is_infinite() {
            self
        } else {
            Self(self.0 + 1)
        }
    }

    /// Arithmetic mean truncated toward zero, computed without overflow
    pub fn midpoint(self, other: DateTime) -> Self {
        Self(((i128::from(self.0) + i128::from(other.0)) / 2) as i64)
    }

    pub fn checked_add(self, elapsed: ElapsedTime) -> Option<Self> {
        self.0.checked_add(elapsed.raw()).map(Self)
    }

    pub fn checked_sub(self, elapsed: ElapsedTime) -> Option<Self> {
        self.0.checked_sub(elapsed.raw()).map(Self)
    }

    /// Distance to a later stamp, saturating on overflow
    pub fn until(self, later: DateTime) -> ElapsedTime {
        ElapsedTime::from_raw(later.0.saturating_sub(self.0))
    }

    /// Seconds since the epoch, as used by program contexts
    pub fn to_seconds_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }

    pub fn from_chrono<Tz: TimeZone>(stamp: &chrono::DateTime<Tz>) -> Option<Self> {
        let seconds = stamp.timestamp().checked_mul(TICKS_PER_SECOND)?;
        let ticks = i64::from(stamp.timestamp_subsec_nanos()) / NANOS_PER_TICK;
        seconds.checked_add(ticks).map(Self)
    }

    pub fn to_chrono(self) -> Option<chrono::DateTime<Utc>> {
        if self.is_infinite() {
            return None;
        }
        let seconds = self.0.div_euclid(TICKS_PER_SECOND);
        let nanos = (self.0.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK) as u32;
        chrono::DateTime::<Utc>::from_timestamp(seconds, nanos)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::BEGINNING_OF_TIME {
            return write!(f, "BEGINNING_OF_TIME");
        }
        if *self == Self::END_OF_TIME {
            return write!(f, "END_OF_TIME");
        }
        match self.to_chrono() {
            Some(stamp) => write!(f, "{}", stamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => write!(f, "@{}", self.0),
        }
    }
}

impl FromStr for DateTime {
    type Err = RelvalError;

    /// Accepts RFC 3339 text, a raw tick count, or the two infinity names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        match text {
            "BEGINNING_OF_TIME" => return Ok(Self::BEGINNING_OF_TIME),
            "END_OF_TIME" => return Ok(Self::END_OF_TIME),
            _ => {},
        }
        let raw = text.strip_prefix('@').unwrap_or(text);
        if let Ok(ticks) = raw.parse::<i64>() {
            return Ok(Self(ticks));
        }
        let parsed = chrono::DateTime::parse_from_rfc3339(text)
            .map_err(|e| RelvalError::parse(format!("date-time '{}'", text), e))?;
        Self::from_chrono(&parsed)
            .ok_or_else(|| RelvalError::parse(format!("date-time '{}'", text), "out of range"))
    }
}

/// Signed duration in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElapsedTime(i64);

impl ElapsedTime {
    pub const ZERO: ElapsedTime = ElapsedTime(0);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(TICKS_PER_SECOND))
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(TICKS_PER_SECOND / 1000))
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_mul(self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }
}

impl From<Duration> for ElapsedTime {
    fn from(duration: Duration) -> Self {
        let ticks = duration.as_nanos() / NANOS_PER_TICK as u128;
        Self(i64::try_from(ticks).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0.unsigned_abs().saturating_mul(NANOS_PER_TICK as u64);
        if self.0 < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}", humantime::format_duration(Duration::from_nanos(nanos)))
    }
}

impl FromStr for ElapsedTime {
    type Err = RelvalError;

    /// Accepts humantime text ("15m", "1h 30m") or a raw tick count
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if let Ok(ticks) = text.parse::<i64>() {
            return Ok(Self(ticks));
        }
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let duration = humantime::parse_duration(body)
            .map_err(|e| RelvalError::parse(format!("elapsed time '{}'", text), e))?;
        let elapsed = Self::from(duration);
        Ok(if negative { Self(-elapsed.0) } else { elapsed })
    }
}
