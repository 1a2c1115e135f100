//! Golden-ratio relationships between consecutive peaks.
//!
//! Each adjacent peak pair is checked against both 1.618 and 0.618; a pair
//! can match both. All golden matches are listed first in peak order, then
//! all inverse matches; truncation keeps the head of that list.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::helpers::{GOLDEN_RATIO, GOLDEN_TOLERANCE, INVERSE_GOLDEN_RATIO, MAX_GOLDEN_MATCHES};
use super::peaks::PeakFinder;
use crate::params::{get_ratio, ParamMeta, ParameterizedDetector};
use crate::{DetectorId, PatternError, PriceSeries, Ratio, Result, SeriesDetector, SwingPoint};

/// Which target a peak ratio landed near
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldenKind {
    /// Near 1.618
    Golden,
    /// Near 0.618
    InverseGolden,
}

impl GoldenKind {
    #[inline]
    pub fn target(self) -> f64 {
        match self {
            GoldenKind::Golden => GOLDEN_RATIO,
            GoldenKind::InverseGolden => INVERSE_GOLDEN_RATIO,
        }
    }
}

/// One matching peak pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoldenMatch {
    pub index1: usize,
    pub index2: usize,
    pub date1: NaiveDate,
    pub date2: NaiveDate,
    pub price1: f64,
    pub price2: f64,
    pub ratio: f64,
    #[serde(rename = "type")]
    pub kind: GoldenKind,
    pub deviation_percent: f64,
}

/// All matches found; `occurrences` is truncated to the configured maximum
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoldenRatioScan {
    pub found_count: usize,
    pub occurrences: Vec<GoldenMatch>,
}

/// Golden-ratio peak matcher
#[derive(Debug, Clone, Copy)]
pub struct GoldenRatioMatcher {
    pub peaks: PeakFinder,
    pub tolerance: Ratio,
    pub max_matches: usize,
}

impl Default for GoldenRatioMatcher {
    fn default() -> Self {
        Self {
            peaks: PeakFinder::default(),
            tolerance: Ratio::new_const(GOLDEN_TOLERANCE),
            max_matches: MAX_GOLDEN_MATCHES,
        }
    }
}

impl GoldenRatioMatcher {
    /// Relative deviation of `ratio` from the kind's target, if within tolerance
    #[inline]
    fn deviation(&self, ratio: f64, kind: GoldenKind) -> Option<f64> {
        let deviation = (ratio - kind.target()).abs() / kind.target();
        (deviation < self.tolerance.get()).then_some(deviation)
    }

    /// Match consecutive swing points. Fewer than two points yield an empty scan.
    pub fn match_swings(&self, swings: &[SwingPoint]) -> GoldenRatioScan {
        let mut occurrences = Vec::new();

        for kind in [GoldenKind::Golden, GoldenKind::InverseGolden] {
            for pair in swings.windows(2) {
                let (first, second) = (pair[0], pair[1]);
                let ratio = second.price / first.price;
                if !ratio.is_finite() {
                    continue;
                }

                if let Some(deviation) = self.deviation(ratio, kind) {
                    occurrences.push(GoldenMatch {
                        index1: first.index,
                        index2: second.index,
                        date1: first.date,
                        date2: second.date,
                        price1: first.price,
                        price2: second.price,
                        ratio,
                        kind,
                        deviation_percent: deviation * 100.0,
                    });
                }
            }
        }

        let found_count = occurrences.len();
        occurrences.truncate(self.max_matches);
        GoldenRatioScan {
            found_count,
            occurrences,
        }
    }
}

impl SeriesDetector for GoldenRatioMatcher {
    type Output = GoldenRatioScan;

    fn id(&self) -> DetectorId {
        DetectorId("golden_ratios")
    }

    fn detect(&self, series: &PriceSeries) -> Result<GoldenRatioScan> {
        Ok(self.match_swings(&self.peaks.find_peaks(series)))
    }

    fn validate_config(&self) -> Result<()> {
        self.peaks.validate()?;
        if self.max_matches == 0 {
            return Err(PatternError::InvalidValue("max_matches must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// PARAMETERS
// ============================================================

const GOLDEN_PARAMS: &[ParamMeta] = &[ParamMeta::ratio(
    "golden_tolerance",
    GOLDEN_TOLERANCE,
    (0.02, 0.2, 0.02),
    "Relative tolerance around 1.618 and 0.618",
)];

impl ParameterizedDetector for GoldenRatioMatcher {
    fn param_meta() -> &'static [ParamMeta] {
        GOLDEN_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            peaks: PeakFinder::with_params(params)?,
            tolerance: get_ratio(params, "golden_tolerance", GOLDEN_TOLERANCE)?,
            ..Self::default()
        })
    }

    fn detector_id_str() -> &'static str {
        "golden_ratios"
    }
}
