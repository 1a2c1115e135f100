//! Parameter metadata for the tunable detectors
//!
//! This module describes every analyzer tunable, enabling:
//! - Grid sweeps over peak distance, prominence and tolerances
//! - Parameter documentation
//! - Validated overrides from the command line
//!
//! # Example
//!
//! ```rust
//! use yarpd::params::{ParamMeta, ParamType, ParameterizedDetector};
//! use yarpd::prelude::*;
//!
//! for param in PeakFinder::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//! ```

use std::collections::HashMap;

use crate::detectors::helpers::{MAX_FUNCTION_EVALUATIONS, MAX_GOLDEN_MATCHES};
use crate::detectors::{ExponentialPhaseDetector, GoldenRatioMatcher, PeakFinder};
use crate::{PatternError, Period, Ratio, Result};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value in 0.0..=1.0
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Non-negative real with no fixed upper bound (price units, multipliers)
  Threshold,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "prominence")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for sweeps: (min, max, step)
  pub range: (f64, f64, f64),
  pub description: &'static str,
}

impl ParamMeta {
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  pub const fn threshold(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Threshold, default, range, description }
  }

  /// Generate all values for a grid sweep
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut i = 0usize;
    loop {
      let v = min + step * i as f64;
      if v > max + f64::EPSILON * max.abs().max(1.0) {
        break;
      }
      values.push(v);
      i += 1;
    }
    values
  }

  /// Validate a value for this parameter.
  ///
  /// Thresholds only enforce the lower bound; the upper end of their range
  /// bounds the sweep grid, not the accepted values.
  pub fn validate(&self, value: f64) -> Result<()> {
    if !value.is_finite() {
      return Err(PatternError::InvalidValue("parameter value must be finite"));
    }
    let (min, max, _) = self.range;
    let out_of_range = match self.param_type {
      ParamType::Threshold => value < min,
      ParamType::Ratio | ParamType::Period => value < min || value > max,
    };
    if out_of_range {
      return Err(PatternError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio => Ratio::new(value).map(|_| ()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(PatternError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
      ParamType::Threshold => Ok(()),
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that can be built from named parameter values
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Name of the report section this detector feeds
  fn detector_id_str() -> &'static str;
}

// ============================================================
// ANALYZER-LEVEL PARAMETERS
// ============================================================

/// Tunables owned by the analyzer rather than a single detector
const ANALYZER_PARAMS: &[ParamMeta] = &[
  ParamMeta::period(
    "max_golden_matches",
    MAX_GOLDEN_MATCHES as f64,
    (1.0, 50.0, 1.0),
    "Golden-ratio matches kept in the report",
  ),
  ParamMeta::period(
    "max_evaluations",
    MAX_FUNCTION_EVALUATIONS as f64,
    (100.0, 20000.0, 100.0),
    "Function evaluation cap for the exponential fit",
  ),
];

/// Every tunable the analyzer accepts, detector parameters first
pub fn all_params() -> impl Iterator<Item = &'static ParamMeta> {
  PeakFinder::param_meta()
    .iter()
    .chain(GoldenRatioMatcher::param_meta())
    .chain(ExponentialPhaseDetector::param_meta())
    .chain(ANALYZER_PARAMS)
}

/// Look up a tunable by name
pub fn find_meta(name: &str) -> Option<&'static ParamMeta> {
  all_params().find(|meta| meta.name == name)
}

/// Cartesian product of the grids of the named parameters.
///
/// Unknown names are an error. An empty name list yields one empty assignment.
pub fn parameter_grid(names: &[&str]) -> Result<Vec<HashMap<&'static str, f64>>> {
  let mut combos = vec![HashMap::new()];
  for &name in names {
    let meta = find_meta(name)
      .ok_or_else(|| PatternError::InvalidConfig(format!("unknown parameter '{name}'")))?;
    let grid = meta.generate_grid();
    combos = combos
      .into_iter()
      .flat_map(|combo| {
        grid.iter().map(move |&v| {
          let mut next = combo.clone();
          next.insert(meta.name, v);
          next
        })
      })
      .collect();
  }
  Ok(combos)
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if !value.is_finite() || value < 0.0 {
    return Err(PatternError::InvalidValue("Period must be a positive integer"));
  }
  Period::new(value as usize)
}

/// Helper to get a finite, non-negative threshold from params with default fallback
pub fn get_threshold(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() || value < 0.0 {
    return Err(PatternError::OutOfRange { field: "threshold", value, min: 0.0, max: f64::INFINITY });
  }
  Ok(value)
}

// ============================================================
// TESTS
// ============================================================
