//! Synchronization policies
//!
//! A policy maps any stamp onto the stamps considered "in sync". Every
//! operation is a pure function of its arguments, so one policy can be shared
//! by all points and behaviors that reference it.

use errors::{RelvalError, Result};

use crate::time::{DateTime, ElapsedTime};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncPolicy {
    /// Regular period: `offset + k * elapsed`
    Elapsed {
        elapsed: ElapsedTime,
        offset: ElapsedTime,
    },
    /// Explicit sorted list of stamps
    Stamps(Vec<DateTime>),
}

impl SyncPolicy {
    pub fn elapsed(elapsed: ElapsedTime, offset: ElapsedTime) -> Result<Self> {
        if !elapsed.is_positive() {
            return Err(RelvalError::invalid_parameter(
                "sync.elapsed",
                format!("must be positive, got {}", elapsed.raw()),
            ));
        }
        Ok(Self::Elapsed { elapsed, offset })
    }

    pub fn stamps(mut stamps: Vec<DateTime>) -> Result<Self> {
        if stamps.is_empty() {
            return Err(RelvalError::invalid_parameter("sync.stamps", "empty stamp list"));
        }
        stamps.sort_unstable();
        stamps.dedup();
        Ok(Self::Stamps(stamps))
    }

    /// Largest in-sync stamp not after `stamp` (regular period only)
    fn floor(elapsed: ElapsedTime, offset: ElapsedTime, stamp: DateTime) -> Option<DateTime> {
        let period = i128::from(elapsed.raw());
        let offset = i128::from(offset.raw());
        let relative = i128::from(stamp.raw()) - offset;
        let floor = offset + relative.div_euclid(period) * period;
        i64::try_from(floor).ok().map(DateTime::from_raw)
    }

    pub fn is_in_sync(&self, stamp: DateTime) -> bool {
        if stamp.is_infinite() {
            return false;
        }
        match self {
            Self::Elapsed { elapsed, offset } => {
                Self::floor(*elapsed, *offset, stamp) == Some(stamp)
            },
            Self::Stamps(stamps) => stamps.binary_search(&stamp).is_ok(),
        }
    }

    pub fn next_stamp(&self, stamp: DateTime) -> Option<DateTime> {
        self.next_stamp_by(stamp, 1)
    }

    pub fn previous_stamp(&self, stamp: DateTime) -> Option<DateTime> {
        self.previous_stamp_by(stamp, 1)
    }

    /// The `intervals`-th in-sync stamp strictly after `stamp`
    pub fn next_stamp_by(&self, stamp: DateTime, intervals: u32) -> Option<DateTime> {
        if intervals == 0 || stamp == DateTime::END_OF_TIME {
            return None;
        }
        match self {
            Self::Elapsed { elapsed, offset } => {
                if stamp == DateTime::BEGINNING_OF_TIME {
                    return None;
                }
                let floor = Self::floor(*elapsed, *offset, stamp)?;
                floor.checked_add(elapsed.checked_mul(i64::from(intervals))?)
            },
            Self::Stamps(stamps) => {
                let index = stamps.partition_point(|s| *s <= stamp);
                stamps.get(index + intervals as usize - 1).copied()
            },
        }
    }

    /// The `intervals`-th in-sync stamp strictly before `stamp`
    pub fn previous_stamp_by(&self, stamp: DateTime, intervals: u32) -> Option<DateTime> {
        if intervals == 0 || stamp == DateTime::BEGINNING_OF_TIME {
            return None;
        }
        match self {
            Self::Elapsed { elapsed, offset } => {
                if stamp == DateTime::END_OF_TIME {
                    return None;
                }
                let floor = Self::floor(*elapsed, *offset, stamp)?;
                let back = if floor == stamp {
                    i64::from(intervals)
                } else {
                    i64::from(intervals) - 1
                };
                floor.checked_sub(elapsed.checked_mul(back)?)
            },
            Self::Stamps(stamps) => {
                let index = stamps.partition_point(|s| *s < stamp);
                let intervals = intervals as usize;
                if index >= intervals {
                    Some(stamps[index - intervals])
                } else {
                    None
                }
            },
        }
    }
}
