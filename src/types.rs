use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, Timelike};

use crate::error::TimeParseError;

pub const MILLIS_PER_DAY: u64 = 86_400_000;

/// A local time of day, precise to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
    second: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, TimeParseError> {
        if hour > 23 {
            return Err(TimeParseError::OutOfRange { field: "hour", value: hour });
        }
        if minute > 59 {
            return Err(TimeParseError::OutOfRange { field: "minute", value: minute });
        }
        if second > 59 {
            return Err(TimeParseError::OutOfRange { field: "second", value: second });
        }
        Ok(Self { hour, minute, second })
    }

    pub fn from_time<T: Timelike>(time: &T) -> Self {
        // Leap seconds report second 59 with extra nanoseconds, so the fields stay in range.
        Self {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }

    pub fn now() -> Self {
        Self::from_time(&Local::now())
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    /// Milliseconds since local midnight.
    pub fn millis(&self) -> u64 {
        1000 * u64::from(self.second) + 60_000 * u64::from(self.minute) + 3_600_000 * u64::from(self.hour)
    }

    /// Time to wait from `self` until the next occurrence of `target`.
    ///
    /// Equal times yield a full day, never zero.
    pub fn wait_until(&self, target: &TimeOfDay) -> Duration {
        Duration::from_millis(wait_millis(self.millis(), target.millis()))
    }
}

/// Milliseconds from `current` until the next occurrence of `target`, both measured
/// from local midnight.
pub fn wait_millis(current: u64, target: u64) -> u64 {
    if current >= target {
        MILLIS_PER_DAY - current + target
    } else {
        target - current
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 3 {
            return Err(TimeParseError::Format(s.to_string()));
        }
        let mut fields = [0u32; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(TimeParseError::Format(s.to_string()));
            }
            *slot = part
                .parse()
                .map_err(|_| TimeParseError::Format(s.to_string()))?;
        }
        TimeOfDay::new(fields[0], fields[1], fields[2])
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn equal_times_wait_a_full_day() {
        for ms in [0, 1, 43_200_000, MILLIS_PER_DAY - 1] {
            assert_eq!(wait_millis(ms, ms), MILLIS_PER_DAY);
        }
        let t: TimeOfDay = "07:30:00".parse().expect("parse");
        assert_eq!(t.wait_until(&t), Duration::from_millis(MILLIS_PER_DAY));
    }

    #[test]
    fn target_later_today() {
        assert_eq!(wait_millis(1_000, 5_000), 4_000);
        assert_eq!(wait_millis(0, MILLIS_PER_DAY - 1), MILLIS_PER_DAY - 1);
    }

    #[test]
    fn target_already_passed_wraps_to_tomorrow() {
        assert_eq!(wait_millis(5_000, 1_000), MILLIS_PER_DAY - 4_000);
        assert_eq!(wait_millis(MILLIS_PER_DAY - 1, 0), 1);
    }

    #[test]
    fn wait_is_bounded_by_one_day() {
        let step = 3_599_999;
        let mut ct = 0;
        while ct < MILLIS_PER_DAY {
            let mut nt = 0;
            while nt < MILLIS_PER_DAY {
                let wait = wait_millis(ct, nt);
                assert!(wait > 0 && wait <= MILLIS_PER_DAY, "ct={ct} nt={nt} wait={wait}");
                assert_eq!((ct + wait) % MILLIS_PER_DAY, nt);
                nt += step;
            }
            ct += step;
        }
    }

    #[test]
    fn parse_and_display() {
        let t: TimeOfDay = "23:05:09".parse().expect("parse");
        assert_eq!((t.hour(), t.minute(), t.second()), (23, 5, 9));
        assert_eq!(t.to_string(), "23:05:09");
        assert_eq!(t.millis(), 23 * 3_600_000 + 5 * 60_000 + 9_000);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!("12:00".parse::<TimeOfDay>(), Err(TimeParseError::Format(_))));
        assert!(matches!("aa:00:00".parse::<TimeOfDay>(), Err(TimeParseError::Format(_))));
        assert!(matches!("12::00".parse::<TimeOfDay>(), Err(TimeParseError::Format(_))));
        assert!(matches!("-1:00:00".parse::<TimeOfDay>(), Err(TimeParseError::Format(_))));
        assert_eq!(
            "24:00:00".parse::<TimeOfDay>(),
            Err(TimeParseError::OutOfRange { field: "hour", value: 24 })
        );
        assert_eq!(
            "00:60:00".parse::<TimeOfDay>(),
            Err(TimeParseError::OutOfRange { field: "minute", value: 60 })
        );
        assert_eq!(
            "00:00:60".parse::<TimeOfDay>(),
            Err(TimeParseError::OutOfRange { field: "second", value: 60 })
        );
    }

    #[test]
    fn from_clock_time() {
        let time = NaiveTime::from_hms_opt(6, 7, 8).expect("time");
        assert_eq!(TimeOfDay::from_time(&time).to_string(), "06:07:08");
    }
}
