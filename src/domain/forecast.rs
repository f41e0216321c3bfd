use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BiddingZone;

/// Contiguous block of forecast hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    /// Local hour of day the window starts (0-23)
    pub start_hour: u32,
    /// Local hour of day the window ends, exclusive (0-23)
    pub end_hour: u32,
    /// Offset of the first hour into the forecast vector
    pub offset: usize,
    /// Extreme price of the whole forecast (min for the cheapest window, max for the peak)
    pub price: f64,
    /// Mean price over the hours of this window
    pub window_average: f64,
}

/// Structured usage guidance derived from one forecast vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecommendation {
    pub window_hours: usize,
    pub cheapest_window: UsageWindow,
    pub peak_window: UsageWindow,
    pub average_price: f64,
    /// Moving a `window_hours` load from peak to cheapest every day for 30 days
    pub estimated_monthly_savings: f64,
}

/// Forecast for one bidding zone, as handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneForecast {
    pub zone: BiddingZone,
    pub generated_at: DateTime<Utc>,
    /// Start of the first forecast hour
    pub starts_at: Option<DateTime<Utc>>,
    /// Predicted hourly prices in raw units
    pub prices: Vec<f64>,
    pub recommendation: WindowRecommendation,
    pub model_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start_hour: u32, price: f64) -> UsageWindow {
        UsageWindow {
            start_hour,
            end_hour: (start_hour + 3) % 24,
            offset: start_hour as usize,
            price,
            window_average: price,
        }
    }

    #[test]
    fn test_recommendation_serialization() {
        let rec = WindowRecommendation {
            window_hours: 3,
            cheapest_window: window(2, 0.05),
            peak_window: window(18, 0.4),
            average_price: 0.2,
            estimated_monthly_savings: 31.5,
        };
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("cheapest_window"));
        assert!(json.contains("estimated_monthly_savings"));
    }
}
