//! Strongest run-up located by drawup and fitted with `price(t) = a * exp(b * t)`.

use std::collections::HashMap;

use chrono::NaiveDate;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{storage::Owned, DVector, Dyn, OMatrix, Vector2, U2};
use serde::Serialize;

use super::helpers::{
    argmax, ensure_finite, running_min, EXCELLENT_FIT_R2, INITIAL_RATE, MAX_FUNCTION_EVALUATIONS,
    MIN_SEGMENT_LEN, START_TOLERANCE,
};
use crate::params::{get_period, get_threshold, ParamMeta, ParameterizedDetector};
use crate::{DetectorId, PatternError, PriceSeries, Result, SeriesDetector};

/// Fitted exponential phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExponentialPhase {
    pub phase: &'static str,
    pub start_index: usize,
    pub end_index: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_price: f64,
    pub end_price: f64,
    /// Fitted amplitude `a`
    pub amplitude: f64,
    /// Fitted rate `b`, per day
    pub growth_rate: f64,
    pub r_squared: f64,
    pub growth_multiple: f64,
    pub duration_days: usize,
    /// Largest `(price - running_min) / running_min`
    pub max_drawup: f64,
    pub quality: &'static str,
}

/// Result of the nonlinear least-squares fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialFit {
    pub amplitude: f64,
    pub rate: f64,
    pub evaluations: usize,
}

impl ExponentialFit {
    #[inline]
    pub fn predict(&self, t: f64) -> f64 {
        self.amplitude * (self.rate * t).exp()
    }
}

/// Exponential growth phase detector
#[derive(Debug, Clone, Copy)]
pub struct ExponentialPhaseDetector {
    pub min_segment_len: usize,
    pub start_tolerance: f64,
    pub max_evaluations: usize,
}

impl Default for ExponentialPhaseDetector {
    fn default() -> Self {
        Self {
            min_segment_len: MIN_SEGMENT_LEN,
            start_tolerance: START_TOLERANCE,
            max_evaluations: MAX_FUNCTION_EVALUATIONS,
        }
    }
}

/// `(price - running_min) / running_min` at every index
pub fn drawups(prices: &[f64]) -> Vec<f64> {
    prices
        .iter()
        .zip(running_min(prices))
        .map(|(&p, low)| (p - low) / low)
        .collect()
}

impl ExponentialPhaseDetector {
    /// Locate `(start_index, end_index)` of the strongest run-up.
    ///
    /// The end is the largest drawup. Walking back from it, the start moves to
    /// any earlier price below `start_tolerance` times the current start price.
    pub fn locate_run(&self, prices: &[f64]) -> Option<(usize, usize)> {
        let end = argmax(&drawups(prices))?;
        let mut start = 0;
        for i in (0..end).rev() {
            if prices[i] < prices[start] * self.start_tolerance {
                start = i;
            }
        }
        Some((start, end))
    }

    /// Fit `a * exp(b * t)` for `t = 0..segment.len()`, seeded at `a = segment[0]`, `b = 0.01`
    pub fn fit(&self, segment: &[f64]) -> Result<ExponentialFit> {
        let Some(&first) = segment.first() else {
            return Err(PatternError::CurveFit("empty segment".to_string()));
        };

        let problem = ExponentialCurve {
            observed: segment,
            params: Vector2::new(first, INITIAL_RATE),
        };
        // the solver budgets patience * (parameters + 1) evaluations
        let patience = self.max_evaluations.div_ceil(3).max(1);
        let (solved, report) = LevenbergMarquardt::new()
            .with_patience(patience)
            .minimize(problem);

        if !report.termination.was_successful() {
            return Err(PatternError::CurveFit(format!(
                "{:?} after {} evaluations",
                report.termination, report.number_of_evaluations
            )));
        }

        let params = solved.params;
        if !params[0].is_finite() || !params[1].is_finite() {
            return Err(PatternError::CurveFit("non-finite parameters".to_string()));
        }

        Ok(ExponentialFit {
            amplitude: params[0],
            rate: params[1],
            evaluations: report.number_of_evaluations,
        })
    }
}

/// Coefficient of determination `1 - SS_res / SS_tot`.
/// A flat segment scores 1.0 when fitted exactly, 0.0 otherwise.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();

    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

impl SeriesDetector for ExponentialPhaseDetector {
    type Output = ExponentialPhase;

    fn id(&self) -> DetectorId {
        DetectorId("exponential_growth")
    }

    fn detect(&self, series: &PriceSeries) -> Result<ExponentialPhase> {
        let prices = series.closes();
        let (start, end) = self
            .locate_run(prices)
            .ok_or(PatternError::InsufficientData { need: 1, got: 0 })?;

        let segment = &prices[start..=end];
        if segment.len() < self.min_segment_len {
            return Err(PatternError::SegmentTooShort {
                need: self.min_segment_len,
                got: segment.len(),
            });
        }

        let fit = self.fit(segment)?;
        let predicted: Vec<f64> = (0..segment.len()).map(|t| fit.predict(t as f64)).collect();
        let r_squared = ensure_finite(self.id(), "r_squared", r_squared(segment, &predicted))?;
        let low = prices[..=end].iter().copied().fold(f64::INFINITY, f64::min);
        let max_drawup = (prices[end] - low) / low;

        Ok(ExponentialPhase {
            phase: "bull_market",
            start_index: start,
            end_index: end,
            start_date: series.date(start),
            end_date: series.date(end),
            start_price: prices[start],
            end_price: prices[end],
            amplitude: fit.amplitude,
            growth_rate: fit.rate,
            r_squared,
            growth_multiple: ensure_finite(self.id(), "growth_multiple", prices[end] / prices[start])?,
            duration_days: end - start,
            max_drawup: ensure_finite(self.id(), "max_drawup", max_drawup)?,
            quality: if r_squared > EXCELLENT_FIT_R2 {
                "excellent"
            } else {
                "good"
            },
        })
    }

    fn validate_config(&self) -> Result<()> {
        if self.min_segment_len < 3 {
            return Err(PatternError::OutOfRange {
                field: "min_segment_len",
                value: self.min_segment_len as f64,
                min: 3.0,
                max: f64::MAX,
            });
        }
        if !self.start_tolerance.is_finite() || self.start_tolerance < 1.0 {
            return Err(PatternError::OutOfRange {
                field: "start_tolerance",
                value: self.start_tolerance,
                min: 1.0,
                max: f64::MAX,
            });
        }
        if self.max_evaluations == 0 {
            return Err(PatternError::InvalidValue("max_evaluations must be > 0"));
        }
        Ok(())
    }
}

// ============================================================
// LEAST-SQUARES PROBLEM
// ============================================================

struct ExponentialCurve<'a> {
    observed: &'a [f64],
    params: Vector2<f64>,
}

impl LeastSquaresProblem<f64, Dyn, U2> for ExponentialCurve<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, U2>;
    type ParameterStorage = Owned<f64, U2>;

    fn set_params(&mut self, params: &Vector2<f64>) {
        self.params.copy_from(params);
    }

    fn params(&self) -> Vector2<f64> {
        self.params
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let (a, b) = (self.params[0], self.params[1]);
        let residuals = DVector::from_iterator(
            self.observed.len(),
            self.observed
                .iter()
                .enumerate()
                .map(|(t, &y)| a * (b * t as f64).exp() - y),
        );
        residuals.iter().all(|r| r.is_finite()).then_some(residuals)
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, U2>> {
        let (a, b) = (self.params[0], self.params[1]);
        let mut jacobian = OMatrix::<f64, Dyn, U2>::zeros(self.observed.len());
        for t in 0..self.observed.len() {
            let t_f = t as f64;
            let e = (b * t_f).exp();
            jacobian[(t, 0)] = e;
            jacobian[(t, 1)] = a * t_f * e;
        }
        jacobian.iter().all(|v| v.is_finite()).then_some(jacobian)
    }
}

// ============================================================
// PARAMETERS
// ============================================================

const EXPONENTIAL_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "min_segment_len",
        MIN_SEGMENT_LEN as f64,
        (5.0, 60.0, 5.0),
        "Shortest run-up accepted for a fit",
    ),
    ParamMeta::threshold(
        "start_tolerance",
        START_TOLERANCE,
        (1.0, 1.5, 0.05),
        "Backward extension tolerance for the run start",
    ),
];

impl ParameterizedDetector for ExponentialPhaseDetector {
    fn param_meta() -> &'static [ParamMeta] {
        EXPONENTIAL_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            min_segment_len: get_period(params, "min_segment_len", MIN_SEGMENT_LEN)?.get(),
            start_tolerance: get_threshold(params, "start_tolerance", START_TOLERANCE)?,
            ..Self::default()
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "exponential_growth"
    }
}
