/*! Time structures.

The `time` module contains structures used to represent both absolute and relative time, and the
coarse protocol clock units that TCP timers count in.

 - [Instant] is used to represent absolute time.
 - [Expiration] is an optional absolute deadline, such as a linger timeout.
 - [Hsec] counts half-seconds, the resolution of retransmission and wait timers.
 - [Dsec] counts deciseconds, the resolution of keepalive timers.

[Instant]: struct.Instant.html
[Expiration]: enum.Expiration.html
[Hsec]: struct.Hsec.html
[Dsec]: struct.Dsec.html
*/
use core::{cmp, fmt, ops};
pub use core::time::Duration;

/// Deciseconds in one half-second.
pub const DSEC_PER_HSEC: u32 = 5;

/// Milliseconds in one half-second.
pub const MSEC_PER_HSEC: u64 = 500;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that represents a number of milliseconds,
/// monotonically increasing since an arbitrary moment in time, such as system startup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    /// Milliseconds since the arbitrary epoch.
    pub millis: i64,
}

/// An expiration time, inversion of `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expiration {
    /// Expires at the given instant.
    When(Instant),
    /// Never expires.
    Never,
}

/// A number of half-seconds.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hsec(pub u32);

/// A number of deciseconds.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dsec(pub u32);

use Expiration::{When, Never};

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The fractional number of milliseconds that have passed since the beginning of time.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the beginning of time.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since the beginning of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl Expiration {
    /// Time remaining until the deadline, or `None` if there is no deadline.
    ///
    /// A deadline in the past yields a zero duration.
    pub fn remaining(self, now: Instant) -> Option<Duration> {
        match self {
            When(deadline) if deadline > now => Some(deadline - now),
            When(_) => Some(Duration::from_millis(0)),
            Never => None,
        }
    }

    /// Check if the deadline has been reached.
    pub fn elapsed(self, now: Instant) -> bool {
        match self {
            When(deadline) => deadline <= now,
            Never => false,
        }
    }
}

impl Hsec {
    /// Convert to deciseconds.
    pub fn as_dsec(self) -> Dsec {
        Dsec(self.0.saturating_mul(DSEC_PER_HSEC))
    }

    /// The whole half-seconds contained in a duration, rounded down.
    pub fn from_duration(duration: Duration) -> Hsec {
        let hsec = duration.as_millis() / u128::from(MSEC_PER_HSEC);
        Hsec(cmp::min(hsec, u128::from(u32::max_value())) as u32)
    }

    /// The half-seconds needed to cover a duration, rounded up.
    pub fn from_duration_ceil(duration: Duration) -> Hsec {
        let per = u128::from(MSEC_PER_HSEC);
        let hsec = (duration.as_millis() + per - 1) / per;
        Hsec(cmp::min(hsec, u128::from(u32::max_value())) as u32)
    }

    /// The duration of this many half-seconds.
    pub fn to_duration(self) -> Duration {
        Duration::from_millis(u64::from(self.0) * MSEC_PER_HSEC)
    }
}

impl Dsec {
    /// Convert to half-seconds, rounding up.
    ///
    /// Rounding up means a remainder shorter than one half-second still produces a non-zero
    /// delay, so a timer with some time left is never mistaken for an idle one.
    pub fn as_hsec_ceil(self) -> Hsec {
        Hsec((self.0 + DSEC_PER_HSEC - 1) / DSEC_PER_HSEC)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}s", self.secs(), self.millis())
    }
}

impl fmt::Display for Hsec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}s", self.0 / 2, (self.0 % 2) * 5)
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis - rhs.as_millis() as i64)
    }
}

impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).abs() as u64)
    }
}

impl ops::Sub for Hsec {
    type Output = Hsec;

    /// Saturating, a timer never counts below its floor.
    fn sub(self, rhs: Hsec) -> Hsec {
        Hsec(self.0.saturating_sub(rhs.0))
    }
}

impl ops::Sub for Dsec {
    type Output = Dsec;

    fn sub(self, rhs: Dsec) -> Dsec {
        Dsec(self.0.saturating_sub(rhs.0))
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(opt: Option<Instant>) -> Self {
        match opt {
            Some(instant) => When(instant),
            None => Never,
        }
    }
}

impl From<Expiration> for Option<Instant> {
    fn from(opt: Expiration) -> Self {
        match opt {
            When(instant) => Some(instant),
            Never => None,
        }
    }
}

impl cmp::PartialOrd<Self> for Expiration {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Expiration {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (*self, *other) {
            (Never, Never) => cmp::Ordering::Equal,
            (Never, When(_)) => cmp::Ordering::Greater,
            (When(_), Never) => cmp::Ordering::Less,
            (When(ref a), When(ref b)) => a.cmp(b),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_instant_ops() {
        assert_eq!(Instant::from_millis(4) + Duration::from_millis(6), Instant::from_millis(10));
        assert_eq!(Instant::from_millis(7) - Duration::from_millis(5), Instant::from_millis(2));
        assert_eq!(Instant::from_secs(3) - Instant::from_millis(500), Duration::from_millis(2500));
    }

    #[test]
    fn test_instant_display() {
        assert_eq!(format!("{}", Instant::from_millis(5674)), "5.674s");
        assert_eq!(format!("{}", Hsec(5)), "2.5s");
    }

    #[test]
    fn expiration_order() {
        let soon = Expiration::When(Instant::from_millis(10));
        assert!(soon < Expiration::Never);
        assert_eq!(soon.remaining(Instant::from_millis(4)), Some(Duration::from_millis(6)));
        assert_eq!(soon.remaining(Instant::from_millis(40)), Some(Duration::from_millis(0)));
        assert!(soon.elapsed(Instant::from_millis(10)));
        assert!(!Expiration::Never.elapsed(Instant::from_millis(i64::max_value())));
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(Dsec(20).as_hsec_ceil(), Hsec(4));
        assert_eq!(Dsec(21).as_hsec_ceil(), Hsec(5));
        assert_eq!(Dsec(2).as_hsec_ceil(), Hsec(1));
        assert_eq!(Dsec(0).as_hsec_ceil(), Hsec(0));
        assert_eq!(Hsec(3).as_dsec(), Dsec(15));
        assert_eq!(Hsec::from_duration(Duration::from_millis(1499)), Hsec(2));
        assert_eq!(Hsec::from_duration_ceil(Duration::from_millis(1001)), Hsec(3));
        assert_eq!(Hsec::from_duration_ceil(Duration::from_millis(0)), Hsec(0));
        assert_eq!(Hsec(3).to_duration(), Duration::from_millis(1500));
        assert_eq!(Hsec(1) - Hsec(4), Hsec(0));
    }
}
