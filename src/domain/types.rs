use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

// ============================================================================
// Geographic and Market Types
// ============================================================================

/// Day-ahead bidding zone with its own price series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BiddingZone {
    #[serde(rename = "DE_LU")]
    DeLu,
    #[serde(rename = "FR")]
    Fr,
    #[serde(rename = "NL")]
    Nl,
    #[serde(rename = "AT")]
    At,
    #[serde(rename = "BE")]
    Be,
}

impl BiddingZone {
    /// ENTSO-E area code of the zone
    pub fn eic_code(&self) -> &'static str {
        match self {
            Self::DeLu => "10Y1001A1001A82H",
            Self::Fr => "10YFR-RTE------C",
            Self::Nl => "10YNL----------L",
            Self::At => "10YAT-APG------L",
            Self::Be => "10YBE----------2",
        }
    }

    /// Local market time zone, used to express recommended hours
    pub fn timezone(&self) -> Tz {
        match self {
            Self::DeLu => chrono_tz::Europe::Berlin,
            Self::Fr => chrono_tz::Europe::Paris,
            Self::Nl => chrono_tz::Europe::Amsterdam,
            Self::At => chrono_tz::Europe::Vienna,
            Self::Be => chrono_tz::Europe::Brussels,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeLu => "DE_LU",
            Self::Fr => "FR",
            Self::Nl => "NL",
            Self::At => "AT",
            Self::Be => "BE",
        }
    }
}

impl std::fmt::Display for BiddingZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BiddingZone {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DE_LU" | "DE-LU" => Ok(Self::DeLu),
            "FR" => Ok(Self::Fr),
            "NL" => Ok(Self::Nl),
            "AT" => Ok(Self::At),
            "BE" => Ok(Self::Be),
            _ => Err("invalid zone; expected one of DE_LU, FR, NL, AT, BE"),
        }
    }
}

// ============================================================================
// Price Series
// ============================================================================

/// One hourly observation, price already converted to currency per kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Chronological hourly price series.
///
/// Timestamps are strictly increasing and every price is finite. Gaps
/// between hours are not detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> ForecastResult<Self> {
        for (index, point) in points.iter().enumerate() {
            if !point.price.is_finite() {
                return Err(ForecastError::NonFiniteValue { index });
            }
            if index > 0 && point.timestamp <= points[index - 1].timestamp {
                return Err(ForecastError::UnorderedSeries { index });
            }
        }
        Ok(Self { points })
    }

    /// Build a series of consecutive hours starting at `start`.
    pub fn from_hourly(start: DateTime<Utc>, prices: &[f64]) -> ForecastResult<Self> {
        let points = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint::new(start + Duration::hours(i as i64), price))
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Raw prices in chronological order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Start of the hour right after the last observation, i.e. the first
    /// forecast hour.
    pub fn next_hour(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp().map(|ts| ts + Duration::hours(1))
    }

    /// Local hour-of-day (0-23) of the first forecast hour in `tz`.
    pub fn next_local_hour(&self, tz: Tz) -> Option<u32> {
        self.next_hour().map(|ts| ts.with_timezone(&tz).hour())
    }
}

impl TryFrom<Vec<PricePoint>> for PriceSeries {
    type Error = ForecastError;

    fn try_from(points: Vec<PricePoint>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
