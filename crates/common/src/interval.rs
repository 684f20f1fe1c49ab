use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A candle interval. Unknown interval strings are rejected at parse time,
/// so the arithmetic below never has an invalid-interval case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

impl Interval {
    pub const ALL: [Interval; 13] = [
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::H8,
        Interval::H12,
        Interval::D1,
        Interval::W1,
    ];

    pub fn duration(&self) -> Duration {
        match self {
            Interval::M1 => Duration::minutes(1),
            Interval::M3 => Duration::minutes(3),
            Interval::M5 => Duration::minutes(5),
            Interval::M15 => Duration::minutes(15),
            Interval::M30 => Duration::minutes(30),
            Interval::H1 => Duration::hours(1),
            Interval::H2 => Duration::hours(2),
            Interval::H4 => Duration::hours(4),
            Interval::H6 => Duration::hours(6),
            Interval::H8 => Duration::hours(8),
            Interval::H12 => Duration::hours(12),
            Interval::D1 => Duration::days(1),
            Interval::W1 => Duration::days(7),
        }
    }

    /// `t` advanced by exactly one unit of this interval.
    ///
    /// A signal detected at the close of a candle of interval `I` can be
    /// acted on at the earliest one `I` after its open time; this is how
    /// that entry moment is derived.
    pub fn add_one(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        t + self.duration()
    }

    /// Truncate `t` to the most recent interval boundary, in UTC.
    ///
    /// Boundaries are anchored at the Unix epoch, so weekly boundaries fall
    /// on Thursdays.
    pub fn round_down(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.duration().num_milliseconds();
        let rem = t.timestamp_millis().rem_euclid(step);
        t - Duration::milliseconds(rem)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Interval::M1),
            "3m" => Ok(Interval::M3),
            "5m" => Ok(Interval::M5),
            "15m" => Ok(Interval::M15),
            "30m" => Ok(Interval::M30),
            "1h" => Ok(Interval::H1),
            "2h" => Ok(Interval::H2),
            "4h" => Ok(Interval::H4),
            "6h" => Ok(Interval::H6),
            "8h" => Ok(Interval::H8),
            "12h" => Ok(Interval::H12),
            "1d" => Ok(Interval::D1),
            "1w" => Ok(Interval::W1),
            other => Err(Error::InvalidInput(format!("unrecognized interval: {other:?}"))),
        }
    }
}
