//! Candle timeframes
//!
//! Closed set of aggregation intervals and the policy that decides which of
//! them a session collects.

mod policy;

pub use policy::{EmptyDiscoveryPolicy, ResolutionError, TimeframePolicy};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Candle aggregation interval
///
/// Variants are declared shortest first so the derived `Ord` sorts by length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    ThreeHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
    OneMonth,
}

/// Unknown timeframe identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown timeframe: {0:?}")]
pub struct ParseTimeframeError(pub String);

impl Timeframe {
    /// Every supported timeframe, shortest first
    pub const ALL: [Timeframe; 16] = [
        Timeframe::OneMinute,
        Timeframe::ThreeMinutes,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::OneHour,
        Timeframe::TwoHours,
        Timeframe::ThreeHours,
        Timeframe::FourHours,
        Timeframe::SixHours,
        Timeframe::EightHours,
        Timeframe::TwelveHours,
        Timeframe::OneDay,
        Timeframe::ThreeDays,
        Timeframe::OneWeek,
        Timeframe::OneMonth,
    ];

    /// Canonical identifier stored in records
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::ThreeMinutes => "3m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHours => "2h",
            Timeframe::ThreeHours => "3h",
            Timeframe::FourHours => "4h",
            Timeframe::SixHours => "6h",
            Timeframe::EightHours => "8h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::ThreeDays => "3d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
        }
    }

    /// Nominal interval length (a month counts as 30 days)
    pub fn duration(&self) -> Duration {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        const DAY: u64 = 24 * HOUR;
        let secs = match self {
            Timeframe::OneMinute => MINUTE,
            Timeframe::ThreeMinutes => 3 * MINUTE,
            Timeframe::FiveMinutes => 5 * MINUTE,
            Timeframe::FifteenMinutes => 15 * MINUTE,
            Timeframe::ThirtyMinutes => 30 * MINUTE,
            Timeframe::OneHour => HOUR,
            Timeframe::TwoHours => 2 * HOUR,
            Timeframe::ThreeHours => 3 * HOUR,
            Timeframe::FourHours => 4 * HOUR,
            Timeframe::SixHours => 6 * HOUR,
            Timeframe::EightHours => 8 * HOUR,
            Timeframe::TwelveHours => 12 * HOUR,
            Timeframe::OneDay => DAY,
            Timeframe::ThreeDays => 3 * DAY,
            Timeframe::OneWeek => 7 * DAY,
            Timeframe::OneMonth => 30 * DAY,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ParseTimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| ParseTimeframeError(s.to_string()))
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sort shortest first and drop duplicates
pub fn normalize(timeframes: impl IntoIterator<Item = Timeframe>) -> Vec<Timeframe> {
    let mut out: Vec<Timeframe> = timeframes.into_iter().collect();
    out.sort();
    out.dedup();
    out
}
