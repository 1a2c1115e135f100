//! Dominant market cycle from the spectrum of the linearly detrended series.
//!
//! Sample spacing is one day. Only the first `n / 2` bins (the non-negative
//! frequencies of a real signal) are searched, with the DC bin zeroed.
//!
//! Amplitude is reported as `2 / n * |X[k]|`, the peak amplitude of a pure
//! sinusoid at bin `k`; the raw magnitude `|X[k]|` is kept as `pattern_strength`.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;

use super::helpers::{argmax, ensure_finite, linear_detrend, round_to, DAYS_PER_MONTH, STRONG_CYCLE_COUNT};
use crate::{DetectorId, PatternError, PriceSeries, Result, SeriesDetector};

/// Detected dominant cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CyclePattern {
    pub cycle_period_days: usize,
    pub cycle_period_months: f64,
    /// `2 / n * |X[k]|` at the dominant bin
    pub amplitude: f64,
    pub num_cycles: usize,
    /// Raw magnitude `|X[k]|` at the dominant bin
    pub pattern_strength: f64,
    pub cycle_quality: &'static str,
}

/// FFT cycle detector
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleDetector;

/// Magnitudes of the non-negative frequency bins of the detrended series.
/// Bin 0 (DC) is zeroed.
pub fn magnitude_spectrum(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let half = n / 2;
    if half == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = linear_detrend(values)
        .into_iter()
        .map(|x| Complex::new(x, 0.0))
        .collect();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let mut magnitude: Vec<f64> = buffer[..half].iter().map(|c| c.norm()).collect();
    magnitude[0] = 0.0;
    magnitude
}

/// Frequency of bin `k` for `n` samples one day apart, in cycles per day
#[inline]
pub fn bin_frequency(k: usize, n: usize) -> f64 {
    k as f64 * (1.0 / n as f64)
}

impl SeriesDetector for CycleDetector {
    type Output = CyclePattern;

    fn id(&self) -> DetectorId {
        DetectorId("market_cycles")
    }

    fn detect(&self, series: &PriceSeries) -> Result<CyclePattern> {
        let n = series.len();
        let magnitude = magnitude_spectrum(series.closes());

        let dominant = argmax(&magnitude).ok_or(PatternError::NoCyclesDetected)?;
        let frequency = bin_frequency(dominant, n);
        if frequency == 0.0 {
            return Err(PatternError::NoCyclesDetected);
        }

        let period = (1.0 / frequency.abs()) as usize;
        if period == 0 {
            return Err(PatternError::NoCyclesDetected);
        }
        let num_cycles = n / period;
        let strength = ensure_finite(self.id(), "pattern_strength", magnitude[dominant])?;

        Ok(CyclePattern {
            cycle_period_days: period,
            cycle_period_months: round_to(period as f64 / DAYS_PER_MONTH, 1),
            amplitude: strength * 2.0 / n as f64,
            num_cycles,
            pattern_strength: strength,
            cycle_quality: if num_cycles >= STRONG_CYCLE_COUNT {
                "strong"
            } else {
                "moderate"
            },
        })
    }
}
