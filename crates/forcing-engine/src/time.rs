//! Time handling for the output schedule and cycle arithmetic.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::error::{ForcingError, Result};

/// Parse an ISO 8601 timestamp. Accepts RFC 3339, a naive datetime (assumed
/// UTC) or a bare date.
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y%m%d%H%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(ForcingError::invalid_config(format!("invalid time: {}", s)))
}

/// Largest multiple of `step` (counted from the Unix epoch) not after `t`.
pub fn floor_to(t: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let step = step.num_seconds().max(1);
    let rem = t.timestamp().rem_euclid(step);
    let base = t - Duration::seconds(rem);
    base - Duration::nanoseconds(i64::from(base.timestamp_subsec_nanos()))
}

/// Smallest multiple of `step` not before `t`.
pub fn ceil_to(t: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    let floor = floor_to(t, step);
    if floor == t {
        floor
    } else {
        floor + step
    }
}

/// The sequence of output valid times, `start..=end` every `step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputClock {
    next: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
}

impl OutputClock {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step_minutes: i64) -> Result<Self> {
        if step_minutes <= 0 {
            return Err(ForcingError::invalid_config(format!(
                "output frequency must be positive, got {} minutes",
                step_minutes
            )));
        }
        if end < start {
            return Err(ForcingError::invalid_config(format!(
                "output window ends ({}) before it starts ({})",
                end, start
            )));
        }
        Ok(Self {
            next: start,
            end,
            step: Duration::minutes(step_minutes),
        })
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Remaining number of output times.
    pub fn remaining(&self) -> usize {
        if self.next > self.end {
            return 0;
        }
        ((self.end - self.next).num_seconds() / self.step.num_seconds()) as usize + 1
    }
}

impl Iterator for OutputClock {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.end {
            return None;
        }
        let current = self.next;
        self.next = current + self.step;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("2024-01-15T12:00:00Z").unwrap(), at(12, 0));
        assert_eq!(parse_time("2024-01-15T12:30:00").unwrap(), at(12, 30));
        assert_eq!(parse_time("202401151200").unwrap(), at(12, 0));
        assert_eq!(parse_time("2024-01-15").unwrap(), at(0, 0));
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_floor_and_ceil() {
        let hour = Duration::hours(1);
        assert_eq!(floor_to(at(12, 30), hour), at(12, 0));
        assert_eq!(ceil_to(at(12, 30), hour), at(13, 0));
        assert_eq!(floor_to(at(12, 0), hour), at(12, 0));
        assert_eq!(ceil_to(at(12, 0), hour), at(12, 0));

        let six = Duration::hours(6);
        assert_eq!(floor_to(at(17, 59), six).hour(), 12);
        assert_eq!(ceil_to(at(18, 1), six), at(0, 0) + Duration::days(1));
    }

    #[test]
    fn test_clock_inclusive() {
        let clock = OutputClock::new(at(0, 0), at(3, 0), 60).unwrap();
        assert_eq!(clock.remaining(), 4);
        let times: Vec<_> = clock.collect();
        assert_eq!(times, vec![at(0, 0), at(1, 0), at(2, 0), at(3, 0)]);
    }

    #[test]
    fn test_clock_rejects_bad_window() {
        assert!(OutputClock::new(at(0, 0), at(3, 0), 0).is_err());
        assert!(OutputClock::new(at(3, 0), at(0, 0), 60).is_err());
    }
}
