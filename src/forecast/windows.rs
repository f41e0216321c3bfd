//! Usage window analysis
//!
//! Finds the cheapest and most expensive contiguous block of hours in a
//! forecast and turns them into a [`WindowRecommendation`].

use crate::domain::{UsageWindow, WindowRecommendation};
use crate::error::{ForecastError, ForecastResult};

/// Default appliance run time in hours
pub const DEFAULT_WINDOW_HOURS: usize = 3;

/// Days the daily savings are extrapolated over
const SAVINGS_DAYS: f64 = 30.0;

const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowObjective {
    /// Lowest window sum
    Minimize,
    /// Highest window sum
    Maximize,
}

/// Start index of the best `width`-long window of `values`.
///
/// Scans left to right and only moves on strict improvement, so the earliest
/// optimal window wins ties.
pub fn best_window(
    values: &[f64],
    width: usize,
    objective: WindowObjective,
) -> ForecastResult<usize> {
    if width == 0 || width > values.len() {
        return Err(ForecastError::InvalidWindow {
            width,
            len: values.len(),
        });
    }

    let mut best_idx = 0;
    let mut best_sum: f64 = values[..width].iter().sum();
    for (idx, window) in values.windows(width).enumerate().skip(1) {
        let sum: f64 = window.iter().sum();
        let better = match objective {
            WindowObjective::Minimize => sum < best_sum,
            WindowObjective::Maximize => sum > best_sum,
        };
        if better {
            best_idx = idx;
            best_sum = sum;
        }
    }
    Ok(best_idx)
}

fn hour_of_day(start_hour: u32, offset: usize) -> u32 {
    ((start_hour as usize + offset) % HOURS_PER_DAY) as u32
}

fn usage_window(
    values: &[f64],
    offset: usize,
    width: usize,
    start_hour: u32,
    price: f64,
) -> UsageWindow {
    let slice = &values[offset..offset + width];
    UsageWindow {
        start_hour: hour_of_day(start_hour, offset),
        end_hour: hour_of_day(start_hour, offset + width),
        offset,
        price,
        window_average: slice.iter().sum::<f64>() / width as f64,
    }
}

/// Cheapest and peak windows of a forecast plus the savings heuristic
/// `(max - min) * width * 30`.
///
/// `start_hour` is the local hour of `values[0]`; window hours wrap modulo 24.
/// The reported window prices are the forecast-wide minimum and maximum.
pub fn summarize(
    values: &[f64],
    width: usize,
    start_hour: u32,
) -> ForecastResult<WindowRecommendation> {
    let cheapest = best_window(values, width, WindowObjective::Minimize)?;
    let peak = best_window(values, width, WindowObjective::Maximize)?;

    let min_price = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_price = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let average_price = values.iter().sum::<f64>() / values.len() as f64;

    Ok(WindowRecommendation {
        window_hours: width,
        cheapest_window: usage_window(values, cheapest, width, start_hour, min_price),
        peak_window: usage_window(values, peak, width, start_hour, max_price),
        average_price,
        estimated_monthly_savings: (max_price - min_price) * width as f64 * SAVINGS_DAYS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[5.0, 1.0, 1.0, 5.0], 2, WindowObjective::Minimize, 1)]
    #[case(&[5.0, 1.0, 1.0, 5.0], 2, WindowObjective::Maximize, 0)]
    #[case(&[1.0, 1.0, 1.0], 1, WindowObjective::Minimize, 0)]
    #[case(&[1.0, 1.0, 1.0], 1, WindowObjective::Maximize, 0)]
    #[case(&[3.0, 2.0, 9.0, 1.0, 1.0], 2, WindowObjective::Minimize, 3)]
    #[case(&[3.0, 2.0, 9.0, 1.0, 1.0], 2, WindowObjective::Maximize, 1)]
    #[case(&[4.0, 7.0], 2, WindowObjective::Minimize, 0)]
    fn test_best_window(
        #[case] values: &[f64],
        #[case] width: usize,
        #[case] objective: WindowObjective,
        #[case] expected: usize,
    ) {
        assert_eq!(best_window(values, width, objective).unwrap(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(5)]
    fn test_invalid_width(#[case] width: usize) {
        let result = best_window(&[1.0, 2.0, 3.0, 4.0], width, WindowObjective::Minimize);
        assert!(matches!(
            result,
            Err(ForecastError::InvalidWindow { len: 4, .. })
        ));
    }

    #[test]
    fn test_summarize_daily_profile() {
        let mut values = vec![50.0; 24];
        values[2] = 20.0;
        values[3] = 10.0;
        values[4] = 20.0;
        values[18] = 90.0;
        values[19] = 100.0;

        let rec = summarize(&values, 3, 0).unwrap();
        assert_eq!(rec.window_hours, 3);
        assert_eq!(rec.cheapest_window.offset, 2);
        assert_eq!(rec.cheapest_window.start_hour, 2);
        assert_eq!(rec.cheapest_window.end_hour, 5);
        assert_eq!(rec.cheapest_window.price, 10.0);
        assert!((rec.cheapest_window.window_average - 50.0 / 3.0).abs() < 1e-9);
        // [17..20] and [18..21] both sum to 240, the earlier one wins
        assert_eq!(rec.peak_window.offset, 17);
        assert_eq!(rec.peak_window.price, 100.0);
        assert_eq!(rec.estimated_monthly_savings, 90.0 * 3.0 * 30.0);
    }

    #[test]
    fn test_summarize_wraps_hours() {
        let mut values = vec![10.0; 24];
        values[22] = 1.0;
        values[23] = 1.0;

        let rec = summarize(&values, 2, 20).unwrap();
        assert_eq!(rec.cheapest_window.offset, 22);
        assert_eq!(rec.cheapest_window.start_hour, 18);
        assert_eq!(rec.cheapest_window.end_hour, 20);

        let rec = summarize(&values, 2, 23).unwrap();
        assert_eq!(rec.cheapest_window.start_hour, 21);
        assert_eq!(rec.peak_window.start_hour, 23);
        assert_eq!(rec.peak_window.end_hour, 1);
    }

    #[test]
    fn test_summarize_constant_forecast() {
        let rec = summarize(&[10.0; 24], 3, 0).unwrap();
        assert_eq!(rec.cheapest_window.price, 10.0);
        assert_eq!(rec.peak_window.price, 10.0);
        assert_eq!(rec.average_price, 10.0);
        assert_eq!(rec.estimated_monthly_savings, 0.0);
    }

    proptest! {
        #[test]
        fn prop_best_window_is_optimal(
            values in prop::collection::vec(-100.0f64..100.0, 1..48),
            width in 1usize..8,
        ) {
            prop_assume!(width <= values.len());
            let sums: Vec<f64> = values.windows(width).map(|w| w.iter().sum()).collect();

            let min_idx = best_window(&values, width, WindowObjective::Minimize).unwrap();
            let max_idx = best_window(&values, width, WindowObjective::Maximize).unwrap();
            prop_assert!(min_idx + width <= values.len());
            prop_assert!(max_idx + width <= values.len());
            // nothing strictly better exists before or after the chosen start
            prop_assert!(sums[..min_idx].iter().all(|&s| s > sums[min_idx]));
            prop_assert!(sums.iter().all(|&s| s >= sums[min_idx]));
            prop_assert!(sums[..max_idx].iter().all(|&s| s < sums[max_idx]));
            prop_assert!(sums.iter().all(|&s| s <= sums[max_idx]));
        }
    }
}
