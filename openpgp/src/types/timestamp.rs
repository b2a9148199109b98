use std::convert::TryFrom;
use std::fmt;
use std::time::{SystemTime, Duration as SystemDuration, UNIX_EPOCH};

use chrono::{DateTime, Utc};

use crate::{
    Error,
    Result,
};

/// A timestamp representable by OpenPGP.
///
/// OpenPGP timestamps are unsigned 32-bit numbers of seconds since
/// the Unix epoch.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u32);

impl From<Timestamp> for u32 {
    fn from(t: Timestamp) -> Self {
        t.0
    }
}

impl From<u32> for Timestamp {
    fn from(t: u32) -> Self {
        Timestamp(t)
    }
}

impl TryFrom<SystemTime> for Timestamp {
    type Error = anyhow::Error;

    fn try_from(t: SystemTime) -> Result<Self> {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) if d.as_secs() <= std::u32::MAX as u64 =>
                Ok(Timestamp(d.as_secs() as u32)),
            _ => Err(Error::InvalidArgument(
                format!("Time exceeds u32 epoch: {:?}", t))
                     .into()),
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(t: Timestamp) -> Self {
        UNIX_EPOCH + SystemDuration::new(t.0 as u64, 0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match DateTime::<Utc>::from_timestamp(self.0 as i64, 0) {
            Some(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S UTC")),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self, self.0)
    }
}

impl Timestamp {
    /// Returns the current time.
    ///
    /// Times past 2106 are clamped.
    pub fn now() -> Timestamp {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp(std::cmp::min(d.as_secs(),
                                             std::u32::MAX as u64) as u32),
            Err(_) => Timestamp(0),
        }
    }

    /// Adds a duration to this timestamp.
    ///
    /// Returns `None` if the resulting timestamp is not
    /// representable.
    pub fn checked_add(&self, d: Duration) -> Option<Timestamp> {
        self.0.checked_add(d.0).map(Self)
    }

    /// Subtracts a duration from this timestamp.
    ///
    /// Returns `None` if the resulting timestamp is not
    /// representable.
    pub fn checked_sub(&self, d: Duration) -> Option<Timestamp> {
        self.0.checked_sub(d.0).map(Self)
    }

    /// Returns the serialized form.
    pub fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// A duration representable by OpenPGP.
///
/// Used for signature and key expiration times.  A duration of zero
/// means "does not expire".
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(u32);

impl From<Duration> for u32 {
    fn from(d: Duration) -> Self {
        d.0
    }
}

impl From<u32> for Duration {
    fn from(d: u32) -> Self {
        Duration(d)
    }
}

impl TryFrom<SystemDuration> for Duration {
    type Error = anyhow::Error;

    fn try_from(d: SystemDuration) -> Result<Self> {
        if d.as_secs() <= std::u32::MAX as u64 {
            Ok(Duration(d.as_secs() as u32))
        } else {
            Err(Error::InvalidArgument(
                format!("Duration exceeds u32: {:?}", d)).into())
        }
    }
}

impl From<Duration> for SystemDuration {
    fn from(d: Duration) -> Self {
        SystemDuration::new(d.0 as u64, 0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", SystemDuration::from(*self))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("never")
        } else if self.0 % 86400 == 0 {
            write!(f, "{} days", self.0 / 86400)
        } else {
            write!(f, "{} seconds", self.0)
        }
    }
}

impl Duration {
    /// Returns a duration with the given number of seconds.
    pub fn seconds(n: u32) -> Duration {
        n.into()
    }

    /// Returns a duration with the given number of days, if
    /// representable.
    pub fn days(n: u32) -> Result<Duration> {
        n.checked_mul(86400)
            .map(Duration)
            .ok_or_else(|| Error::InvalidArgument(
                format!("Not representable: {} days", n)).into())
    }

    /// Returns the duration as seconds.
    pub fn as_secs(self) -> u64 {
        self.0 as u64
    }

    /// Returns whether this is the "does not expire" duration.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
impl quickcheck::Arbitrary for Timestamp {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Timestamp(<u32 as quickcheck::Arbitrary>::arbitrary(g))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn timestamp_roundtrip(t: Timestamp) -> bool {
        let st = SystemTime::from(t);
        Timestamp::try_from(st).unwrap() == t
    }

    #[test]
    fn display() {
        assert_eq!(Timestamp::from(0).to_string(), "1970-01-01 00:00:00 UTC");
        assert_eq!(Timestamp::from(1_000_000_000).to_string(),
                   "2001-09-09 01:46:40 UTC");
        assert_eq!(Duration::seconds(0).to_string(), "never");
        assert_eq!(Duration::days(2).unwrap().to_string(), "2 days");
    }

    #[test]
    fn arithmetic() {
        let t = Timestamp::from(100);
        assert_eq!(t.checked_add(Duration::seconds(5)), Some(Timestamp::from(105)));
        assert_eq!(t.checked_sub(Duration::seconds(101)), None);
        assert_eq!(Timestamp::from(std::u32::MAX)
                   .checked_add(Duration::seconds(1)), None);
        assert!(Duration::days(std::u32::MAX).is_err());
    }
}
