//! Descriptive statistics over the close prices.

use chrono::NaiveDate;
use serde::Serialize;
use statrs::statistics::Statistics;

use super::helpers::ensure_finite;
use crate::{DetectorId, PatternError, PriceSeries, Result, SeriesDetector};

/// Summary statistics detector
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesStats;

/// Count, date range, price moments, growth and volatility
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub total_days: usize,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub price_min: f64,
    pub price_max: f64,
    pub price_mean: f64,
    /// Population standard deviation
    pub price_std: f64,
    /// `(last / first - 1) * 100`
    pub total_growth: f64,
    /// `std / mean * 100`
    pub volatility: f64,
}

impl SeriesStats {
    /// Compute the summary over raw prices and their date bounds
    pub fn summarize(
        prices: &[f64],
        first_date: NaiveDate,
        last_date: NaiveDate,
    ) -> Result<SeriesSummary> {
        let id = DetectorId("statistics");
        let (Some(&first), Some(&last)) = (prices.first(), prices.last()) else {
            return Err(PatternError::InsufficientData { need: 1, got: 0 });
        };

        let price_min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let price_max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let price_mean = prices.iter().mean();
        let price_std = if prices.len() > 1 {
            prices.iter().population_std_dev()
        } else {
            0.0
        };

        if first.abs() <= f64::EPSILON || price_mean.abs() <= f64::EPSILON {
            return Err(PatternError::InsufficientData {
                need: 1,
                got: prices.len(),
            });
        }

        Ok(SeriesSummary {
            total_days: prices.len(),
            date_range_start: first_date,
            date_range_end: last_date,
            price_min,
            price_max,
            price_mean: ensure_finite(id, "price_mean", price_mean)?,
            price_std: ensure_finite(id, "price_std", price_std)?,
            total_growth: ensure_finite(id, "total_growth", (last / first - 1.0) * 100.0)?,
            volatility: ensure_finite(id, "volatility", price_std / price_mean * 100.0)?,
        })
    }
}

impl SeriesDetector for SeriesStats {
    type Output = SeriesSummary;

    fn id(&self) -> DetectorId {
        DetectorId("statistics")
    }

    fn detect(&self, series: &PriceSeries) -> Result<SeriesSummary> {
        let (Some(first), Some(last)) = (series.bars().first(), series.bars().last()) else {
            return Err(PatternError::InsufficientData { need: 1, got: 0 });
        };
        Self::summarize(series.closes(), first.date, last.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, d).unwrap()
    }

    #[test]
    fn test_constant_series_has_zero_volatility() {
        let summary = SeriesStats::summarize(&[100.0, 100.0, 100.0], date(1), date(3)).unwrap();
        assert_eq!(summary.volatility, 0.0);
        assert_eq!(summary.price_std, 0.0);
        assert_eq!(summary.total_growth, 0.0);
    }

    #[test]
    fn test_basic_moments() {
        let summary = SeriesStats::summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], date(1), date(8))
            .unwrap();
        assert_eq!(summary.total_days, 8);
        assert_eq!(summary.price_min, 2.0);
        assert_eq!(summary.price_max, 9.0);
        assert!((summary.price_mean - 5.0).abs() < 1e-12);
        assert!((summary.price_std - 2.0).abs() < 1e-12);
        assert!((summary.total_growth - 350.0).abs() < 1e-9);
        assert!((summary.volatility - 40.0).abs() < 1e-9);
        assert_eq!(summary.date_range_end, date(8));
    }

    #[test]
    fn test_empty_is_insufficient() {
        assert!(matches!(
            SeriesStats::summarize(&[], date(1), date(1)),
            Err(PatternError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_zero_mean_is_insufficient() {
        assert!(matches!(
            SeriesStats::summarize(&[1.0, -1.0], date(1), date(2)),
            Err(PatternError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_zero_first_price_reports_series_length() {
        assert_eq!(
            SeriesStats::summarize(&[0.0, 5.0, 10.0], date(1), date(3)),
            Err(PatternError::InsufficientData { need: 1, got: 3 })
        );
    }
}
