use bincode::de::BorrowDecoder;
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::BorrowDecode;
use bincode::{Decode, Encode};
use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Buffer times are u64 nanoseconds from an arbitrary epoch.
/// They are always positive to simplify the reasoning on the user side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TfDuration(pub u64);

/// A timestamp is just a duration from a fixed point in time.
pub type TfTime = TfDuration;

impl TfDuration {
    pub const ZERO: Self = TfDuration(0);

    /// The "latest available" query sentinel. A lookup at this time resolves to the
    /// most recent time common to every dynamic edge on the path.
    pub const LATEST: Self = TfDuration(0);

    /// A time no history ever contains. Histories cap their stamps strictly
    /// below it, so a lookup here always fails `TimeOutOfRange` on a dynamic
    /// edge.
    pub const OUT_OF_RANGE: Self = TfDuration(u64::MAX);

    /// Builds a time from the `(sec, nanosec)` pair used at the boundary.
    ///
    /// Stored times are unsigned, and zero is the LATEST sentinel, so a
    /// negative-second pair maps to [`TfDuration::OUT_OF_RANGE`] rather than
    /// saturating onto the sentinel and silently resolving to "latest".
    pub fn from_sec_nanos(sec: i64, nanosec: u32) -> Self {
        if sec < 0 {
            return Self::OUT_OF_RANGE;
        }
        TfDuration((sec as u64).saturating_mul(1_000_000_000).saturating_add(nanosec as u64))
    }

    /// Splits the time back into the `(sec, nanosec)` boundary pair.
    pub fn to_sec_nanos(self) -> (i64, u32) {
        ((self.0 / 1_000_000_000) as i64, (self.0 % 1_000_000_000) as u32)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }
}

/// bridge the API with standard Durations.
impl From<Duration> for TfDuration {
    fn from(duration: Duration) -> Self {
        TfDuration(duration.as_nanos() as u64)
    }
}

impl From<TfDuration> for Duration {
    fn from(duration: TfDuration) -> Self {
        Duration::from_nanos(duration.0)
    }
}

impl From<u64> for TfDuration {
    fn from(nanos: u64) -> Self {
        TfDuration(nanos)
    }
}

impl From<TfDuration> for u64 {
    fn from(duration: TfDuration) -> Self {
        duration.0
    }
}

impl Sub for TfDuration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        TfDuration(self.0.saturating_sub(rhs.0))
    }
}

impl Add for TfDuration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        TfDuration(self.0 + rhs.0)
    }
}

impl Encode for TfDuration {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.0.encode(encoder)
    }
}

impl Decode for TfDuration {
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(TfDuration(u64::decode(decoder)?))
    }
}

impl<'de> BorrowDecode<'de> for TfDuration {
    fn borrow_decode<D: BorrowDecoder<'de>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(TfDuration(u64::decode(decoder)?))
    }
}

impl Display for TfDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let nanos = self.0;
        if nanos >= 86_400_000_000_000 {
            write!(f, "{:.3} d", nanos as f64 / 86_400_000_000_000.0)
        } else if nanos >= 3_600_000_000_000 {
            write!(f, "{:.3} h", nanos as f64 / 3_600_000_000_000.0)
        } else if nanos >= 60_000_000_000 {
            write!(f, "{:.3} m", nanos as f64 / 60_000_000_000.0)
        } else if nanos >= 1_000_000_000 {
            write!(f, "{:.3} s", nanos as f64 / 1_000_000_000.0)
        } else if nanos >= 1_000_000 {
            write!(f, "{:.3} ms", nanos as f64 / 1_000_000.0)
        } else if nanos >= 1_000 {
            write!(f, "{:.3} µs", nanos as f64 / 1_000.0)
        } else {
            write!(f, "{nanos} ns")
        }
    }
}

/// Closed time interval covered by a history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfTimeRange {
    pub start: TfTime,
    pub end: TfTime,
}
