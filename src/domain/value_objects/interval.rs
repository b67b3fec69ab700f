use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::errors::ValidationError;

/// Bar size of a price series, in the vocabulary used by the price service
/// ("1m", "15m", "1H", "4H", "1D", "1W", "1M", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeInterval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    Mo1,
}

const MINUTE_MS: u64 = 60_000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

impl TimeInterval {
    pub fn as_millis(&self) -> u64 {
        match self {
            TimeInterval::M1 => MINUTE_MS,
            TimeInterval::M3 => 3 * MINUTE_MS,
            TimeInterval::M5 => 5 * MINUTE_MS,
            TimeInterval::M15 => 15 * MINUTE_MS,
            TimeInterval::M30 => 30 * MINUTE_MS,
            TimeInterval::H1 => HOUR_MS,
            TimeInterval::H2 => 2 * HOUR_MS,
            TimeInterval::H4 => 4 * HOUR_MS,
            TimeInterval::H6 => 6 * HOUR_MS,
            TimeInterval::H8 => 8 * HOUR_MS,
            TimeInterval::H12 => 12 * HOUR_MS,
            TimeInterval::D1 => DAY_MS,
            TimeInterval::D3 => 3 * DAY_MS,
            TimeInterval::W1 => 7 * DAY_MS,
            TimeInterval::Mo1 => 30 * DAY_MS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInterval::M1 => "1m",
            TimeInterval::M3 => "3m",
            TimeInterval::M5 => "5m",
            TimeInterval::M15 => "15m",
            TimeInterval::M30 => "30m",
            TimeInterval::H1 => "1H",
            TimeInterval::H2 => "2H",
            TimeInterval::H4 => "4H",
            TimeInterval::H6 => "6H",
            TimeInterval::H8 => "8H",
            TimeInterval::H12 => "12H",
            TimeInterval::D1 => "1D",
            TimeInterval::D3 => "3D",
            TimeInterval::W1 => "1W",
            TimeInterval::Mo1 => "1M",
        }
    }

    /// Window of `bars` bars ending at `now_ms`, returned as
    /// `(time_from, time_to)` in unix seconds.
    pub fn lookback_window(&self, now_ms: i64, bars: u32) -> (i64, i64) {
        let span_ms = self.as_millis() as i64 * i64::from(bars);
        ((now_ms - span_ms) / 1000, now_ms / 1000)
    }
}

impl FromStr for TimeInterval {
    type Err = ValidationError;

    // Minutes are lower-case, everything from hours up is upper-case; "1M" is a month.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let interval = match value.trim() {
            "1m" => TimeInterval::M1,
            "3m" => TimeInterval::M3,
            "5m" => TimeInterval::M5,
            "15m" => TimeInterval::M15,
            "30m" => TimeInterval::M30,
            "1H" | "1h" => TimeInterval::H1,
            "2H" | "2h" => TimeInterval::H2,
            "4H" | "4h" => TimeInterval::H4,
            "6H" | "6h" => TimeInterval::H6,
            "8H" | "8h" => TimeInterval::H8,
            "12H" | "12h" => TimeInterval::H12,
            "1D" | "1d" => TimeInterval::D1,
            "3D" | "3d" => TimeInterval::D3,
            "1W" | "1w" => TimeInterval::W1,
            "1M" => TimeInterval::Mo1,
            other => return Err(ValidationError::InvalidInterval(other.to_string())),
        };
        Ok(interval)
    }
}

impl TryFrom<String> for TimeInterval {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeInterval> for String {
    fn from(interval: TimeInterval) -> Self {
        interval.as_str().to_string()
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
