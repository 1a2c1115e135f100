//! Local extrema with distance and prominence constraints.
//!
//! Candidates are strict local maxima (a flat top counts once, at its
//! midpoint). Candidates closer than `distance` to a higher candidate are
//! dropped first; survivors must then stand at least `prominence` above the
//! higher of the two surrounding bases.

use std::collections::HashMap;

use super::helpers::{DEFAULT_PEAK_DISTANCE, DEFAULT_PROMINENCE};
use crate::params::{get_period, get_threshold, ParamMeta, ParameterizedDetector};
use crate::{PatternError, Period, PriceSeries, Result, SwingPoint};

/// Peak/trough finder shared by the Fibonacci and golden-ratio detectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFinder {
    pub distance: Period,
    pub prominence: f64,
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self {
            distance: Period::new_const(DEFAULT_PEAK_DISTANCE),
            prominence: DEFAULT_PROMINENCE,
        }
    }
}

impl PeakFinder {
    pub fn new(distance: usize, prominence: f64) -> Result<Self> {
        let finder = Self {
            distance: Period::new(distance)?,
            prominence,
        };
        finder.validate()?;
        Ok(finder)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.prominence.is_finite() {
            return Err(PatternError::InvalidValue("prominence must be finite"));
        }
        if self.prominence < 0.0 {
            return Err(PatternError::OutOfRange {
                field: "prominence",
                value: self.prominence,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(())
    }

    /// Indices of qualifying maxima, strictly increasing
    pub fn find_extrema(&self, values: &[f64]) -> Vec<usize> {
        let candidates = local_maxima(values);
        let spaced = select_by_distance(values, &candidates, self.distance.get());
        let prominences = peak_prominences(values, &spaced);

        spaced
            .into_iter()
            .zip(prominences)
            .filter(|&(_, p)| p >= self.prominence)
            .map(|(i, _)| i)
            .collect()
    }

    /// Qualifying peaks of the close prices
    pub fn find_peaks(&self, series: &PriceSeries) -> Vec<SwingPoint> {
        self.find_extrema(series.closes())
            .into_iter()
            .map(|i| series.swing_at(i))
            .collect()
    }

    /// Qualifying troughs, found as peaks of the negated close prices
    pub fn find_troughs(&self, series: &PriceSeries) -> Vec<SwingPoint> {
        let negated: Vec<f64> = series.closes().iter().map(|&p| -p).collect();
        self.find_extrema(&negated)
            .into_iter()
            .map(|i| series.swing_at(i))
            .collect()
    }
}

/// Strict local maxima. A plateau is reported once, at its (lower) midpoint.
/// The first and last samples are never maxima.
pub fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut maxima = Vec::new();
    if n < 3 {
        return maxima;
    }

    let mut i = 1;
    let i_max = n - 1;
    while i < i_max {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < i_max && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                let left = i;
                let right = ahead - 1;
                maxima.push((left + right) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    maxima
}

/// Drop candidates closer than `distance` to a higher candidate. Higher
/// candidates are settled first; on equal height the later one wins.
fn select_by_distance(values: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let size = peaks.len();
    let mut keep = vec![true; size];

    let mut order: Vec<usize> = (0..size).collect();
    order.sort_by(|&a, &b| values[peaks[a]].total_cmp(&values[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < size && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter(|&(_, kept)| kept)
        .map(|(&p, _)| p)
        .collect()
}

/// Topographic prominence of each peak: height above the higher of the lowest
/// points reached on either side before the series climbs above the peak.
pub fn peak_prominences(values: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = values[peak];

            let mut left_min = height;
            for &v in values[..=peak].iter().rev() {
                if v > height {
                    break;
                }
                left_min = left_min.min(v);
            }

            let mut right_min = height;
            for &v in &values[peak..] {
                if v > height {
                    break;
                }
                right_min = right_min.min(v);
            }

            height - left_min.max(right_min)
        })
        .collect()
}

// ============================================================
// PARAMETERS
// ============================================================

const PEAK_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "distance",
        DEFAULT_PEAK_DISTANCE as f64,
        (5.0, 90.0, 5.0),
        "Minimum sample distance between two peaks",
    ),
    ParamMeta::threshold(
        "prominence",
        DEFAULT_PROMINENCE,
        (0.0, 5000.0, 250.0),
        "Minimum peak prominence in absolute price units",
    ),
];

impl ParameterizedDetector for PeakFinder {
    fn param_meta() -> &'static [ParamMeta] {
        PEAK_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let distance = get_period(params, "distance", DEFAULT_PEAK_DISTANCE)?;
        let prominence = get_threshold(params, "prominence", DEFAULT_PROMINENCE)?;
        Self::new(distance.get(), prominence)
    }

    fn detector_id_str() -> &'static str {
        "peaks"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima_simple() {
        assert_eq!(local_maxima(&[0.0, 1.0, 0.0, 2.0, 0.0]), vec![1, 3]);
    }

    #[test]
    fn test_local_maxima_plateau_midpoint() {
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 2.0, 0.0]), vec![2]);
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 0.0]), vec![1]);
    }

    #[test]
    fn test_local_maxima_edges_and_shoulders() {
        // rising edge and a shoulder that never falls are not peaks
        assert!(local_maxima(&[3.0, 2.0, 1.0]).is_empty());
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_prominence() {
        let v = [0.0, 5.0, 1.0, 3.0, 2.0, 4.0, 0.0];
        let p = peak_prominences(&v, &[1, 3, 5]);
        assert_eq!(p, vec![5.0, 1.0, 3.0]);
    }

    #[test]
    fn test_distance_keeps_higher_peak() {
        let v = [0.0, 3.0, 0.0, 5.0, 0.0, 4.0, 0.0];
        let finder = PeakFinder::new(3, 0.0).unwrap();
        assert_eq!(finder.find_extrema(&v), vec![3]);

        let finder = PeakFinder::new(2, 0.0).unwrap();
        assert_eq!(finder.find_extrema(&v), vec![1, 3, 5]);
    }

    #[test]
    fn test_prominence_filter() {
        let v = [0.0, 5.0, 1.0, 3.0, 2.0, 4.0, 0.0];
        let finder = PeakFinder::new(1, 2.0).unwrap();
        assert_eq!(finder.find_extrema(&v), vec![1, 5]);
    }

    #[test]
    fn test_troughs_from_negated() {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let series = PriceSeries::from_closes(start, &[5.0, 1.0, 5.0, 2.0, 5.0]).unwrap();
        let finder = PeakFinder::new(1, 1.0).unwrap();
        let troughs = finder.find_troughs(&series);
        assert_eq!(troughs.iter().map(|t| t.index).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(troughs[0].price, 1.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(PeakFinder::new(0, 1.0).is_err());
        assert!(PeakFinder::new(1, -1.0).is_err());
        assert!(PeakFinder::new(1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_with_params() {
        let params = HashMap::from([("distance", 7.0)]);
        let finder = PeakFinder::with_params(&params).unwrap();
        assert_eq!(finder.distance.get(), 7);
        assert_eq!(finder.prominence, DEFAULT_PROMINENCE);
    }
}
