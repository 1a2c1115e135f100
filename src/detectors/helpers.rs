//! Common constants and numeric helpers shared across detector modules.

use crate::{DetectorId, PatternError, Result};

// ============================================================
// DEFAULT THRESHOLDS
// ============================================================

/// Minimum distance between peaks, in samples (tuned for multi-year daily data)
pub const DEFAULT_PEAK_DISTANCE: usize = 30;
/// Minimum peak prominence, in absolute price units
pub const DEFAULT_PROMINENCE: f64 = 1000.0;

/// Golden ratio target used by the peak matcher
pub const GOLDEN_RATIO: f64 = 1.618;
/// Inverse golden ratio target used by the peak matcher
pub const INVERSE_GOLDEN_RATIO: f64 = 0.618;
/// Relative tolerance for a golden-ratio match (8%)
pub const GOLDEN_TOLERANCE: f64 = 0.08;
/// Golden-ratio occurrences kept in the report
pub const MAX_GOLDEN_MATCHES: usize = 10;

/// Shortest segment accepted for an exponential fit
pub const MIN_SEGMENT_LEN: usize = 10;
/// Backward extension tolerance for the run start (10%)
pub const START_TOLERANCE: f64 = 1.1;
/// Function evaluation budget for the exponential fit
pub const MAX_FUNCTION_EVALUATIONS: usize = 5000;
/// Initial rate guess for the exponential fit
pub const INITIAL_RATE: f64 = 0.01;
/// R² above which an exponential fit is labelled "excellent"
pub const EXCELLENT_FIT_R2: f64 = 0.9;

/// Complete cycles needed for a "strong" cycle label
pub const STRONG_CYCLE_COUNT: usize = 2;
/// Days per month used for `cycle_period_months`
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Golden angle (137.5 degrees) in radians
pub const GOLDEN_ANGLE: f64 = 137.5 * std::f64::consts::PI / 180.0;
/// Added to the price range before normalizing to avoid dividing by zero
pub const NORMALIZE_EPSILON: f64 = 1e-9;

// ============================================================
// HELPER FUNCTIONS
// ============================================================

/// Index of the first maximum. NaN never wins a comparison.
#[inline]
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if v <= values[b] || v.is_nan() => {}
            Some(_) => best = Some(i),
            None if !v.is_nan() => best = Some(i),
            None => {}
        }
    }
    best
}

/// Index of the first minimum. NaN never wins a comparison.
#[inline]
pub fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some(b) if v >= values[b] || v.is_nan() => {}
            Some(_) => best = Some(i),
            None if !v.is_nan() => best = Some(i),
            None => {}
        }
    }
    best
}

/// Running minimum (lowest value so far) at each index
pub fn running_min(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(f64::INFINITY, |low, &v| {
            *low = low.min(v);
            Some(*low)
        })
        .collect()
}

/// Running maximum (highest value so far) at each index
pub fn running_max(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(f64::NEG_INFINITY, |high, &v| {
            *high = high.max(v);
            Some(*high)
        })
        .collect()
}

/// Subtract the ordinary least-squares line fitted against the sample index.
pub fn linear_detrend(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }

    let t_mean = (n as f64 - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;

    let (sxy, sxx) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sxy, sxx), (t, &y)| {
            let dt = t as f64 - t_mean;
            (sxy + dt * (y - y_mean), sxx + dt * dt)
        });
    // single sample: the fitted line is the mean
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    values
        .iter()
        .enumerate()
        .map(|(t, &y)| y - (y_mean + slope * (t as f64 - t_mean)))
        .collect()
}

/// Round to a fixed number of decimals
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Reject NaN or infinite results with a detector-specific [`PatternError::NumericFault`]
#[inline]
pub fn ensure_finite(detector: DetectorId, field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PatternError::NumericFault {
            detector: detector.as_str(),
            reason: format!("{field} is {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_of_ties() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[f64::NAN, 1.0]), Some(1));
    }

    #[test]
    fn test_argmin_first_of_ties() {
        assert_eq!(argmin(&[3.0, 1.0, 1.0, 2.0]), Some(1));
    }

    #[test]
    fn test_running_extremes() {
        let v = [5.0, 3.0, 4.0, 1.0, 2.0];
        assert_eq!(running_min(&v), vec![5.0, 3.0, 3.0, 1.0, 1.0]);
        assert_eq!(running_max(&v), vec![5.0, 5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_detrend_removes_line() {
        let line: Vec<f64> = (0..20).map(|t| 3.0 + 2.5 * t as f64).collect();
        for r in linear_detrend(&line) {
            assert!(r.abs() < 1e-9);
        }
    }

    #[test]
    fn test_detrend_single_sample() {
        assert_eq!(linear_detrend(&[7.0]), vec![0.0]);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.04, 1), 2.0);
        assert_eq!(round_to(3.06, 1), 3.1);
    }

    #[test]
    fn test_golden_angle() {
        assert!((GOLDEN_ANGLE - 2.399_827_721_492_203).abs() < 1e-12);
    }
}
