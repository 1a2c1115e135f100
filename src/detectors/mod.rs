//! Recurring-pattern detectors
//!
//! Every detector works on a whole [`PriceSeries`](crate::PriceSeries) and is
//! independent of the others, so they can run in any order.
//!
//! # Detectors
//!
//! - **SeriesStats**: count, date range, min/max/mean/std, growth and volatility
//! - **PeakFinder**: distance and prominence filtered local extrema (shared)
//! - **FibonacciDetector**: retracement and extension levels from the major swing
//! - **ExponentialPhaseDetector**: strongest run-up fitted with `a * exp(b * t)`
//! - **CycleDetector**: dominant period of the detrended spectrum
//! - **GoldenRatioMatcher**: consecutive peak ratios near 1.618 or 0.618

pub mod helpers;

/// Generate `with_defaults()` -> `Self::default()` for multiple detector types.
macro_rules! impl_with_defaults {
  ($($detector:ty),* $(,)?) => {
    $(impl $detector {
      pub fn with_defaults() -> Self { Self::default() }
    })*
  };
}

pub mod cycles;
pub mod exponential;
pub mod fibonacci;
pub mod golden;
pub mod peaks;
pub mod stats;

impl_with_defaults!(
    SeriesStats,
    PeakFinder,
    FibonacciDetector,
    ExponentialPhaseDetector,
    CycleDetector,
    GoldenRatioMatcher,
);

// Re-export all detectors for convenience
pub use cycles::*;
pub use exponential::*;
pub use fibonacci::*;
pub use golden::*;
pub use helpers::*;
pub use peaks::*;
pub use stats::*;
