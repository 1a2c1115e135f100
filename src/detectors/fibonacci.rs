//! Fibonacci retracement and extension levels from the major swing.
//!
//! The swing high is the highest detected peak and the swing low the lowest
//! detected trough. With [`SwingOrdering::Undirected`] the two are chosen
//! independently of their dates; [`SwingOrdering::LowBeforeHigh`] only accepts
//! troughs dated before the swing high.

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use super::helpers::ensure_finite;
use super::peaks::PeakFinder;
use crate::{DetectorId, PatternError, PriceSeries, Result, SeriesDetector, SwingPoint};

/// Fixed set of retracement (≤ 1) and extension (> 1) ratios
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumIter,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::AsRefStr,
)]
pub enum FibRatio {
    #[strum(to_string = "0.0")]
    Zero,
    #[strum(to_string = "0.236")]
    R236,
    #[strum(to_string = "0.382")]
    R382,
    #[strum(to_string = "0.5")]
    Half,
    #[strum(to_string = "0.618")]
    R618,
    #[strum(to_string = "0.786")]
    R786,
    #[strum(to_string = "1.0")]
    One,
    #[strum(to_string = "1.272")]
    R1272,
    #[strum(to_string = "1.618")]
    R1618,
}

impl FibRatio {
    #[inline]
    pub fn value(self) -> f64 {
        match self {
            FibRatio::Zero => 0.0,
            FibRatio::R236 => 0.236,
            FibRatio::R382 => 0.382,
            FibRatio::Half => 0.5,
            FibRatio::R618 => 0.618,
            FibRatio::R786 => 0.786,
            FibRatio::One => 1.0,
            FibRatio::R1272 => 1.272,
            FibRatio::R1618 => 1.618,
        }
    }

    /// The two canonical golden-ratio levels
    #[inline]
    pub fn is_golden(self) -> bool {
        matches!(self, FibRatio::R618 | FibRatio::R1618)
    }

    /// Overlay color for the level's ring
    pub fn color(self) -> &'static str {
        match self {
            FibRatio::Zero | FibRatio::One => "#C9A961",
            FibRatio::R236 => "#7BA591",
            FibRatio::R382 => "#8B7BA8",
            FibRatio::Half => "#5C8BB8",
            FibRatio::R618 => "#FFD700",
            FibRatio::R786 => "#B85C5C",
            FibRatio::R1618 => "#FF6B6B",
            FibRatio::R1272 => "#7BA591",
        }
    }
}

impl Serialize for FibRatio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.as_ref())
    }
}

/// Price at every [`FibRatio`], in ratio order
#[derive(Debug, Clone, PartialEq)]
pub struct FibonacciLevels {
    levels: Vec<(FibRatio, f64)>,
}

impl FibonacciLevels {
    /// Interpolate below 1.0 from the low, extend above 1.0 from the high.
    /// The 0.0 and 1.0 levels are the swing prices themselves.
    pub fn from_swings(swing_high: f64, swing_low: f64) -> Self {
        let diff = swing_high - swing_low;
        let levels = FibRatio::iter()
            .map(|ratio| {
                let price = match ratio {
                    FibRatio::Zero => swing_low,
                    FibRatio::One => swing_high,
                    r if r.value() < 1.0 => swing_low + diff * r.value(),
                    r => swing_high + diff * (r.value() - 1.0),
                };
                (ratio, price)
            })
            .collect();
        Self { levels }
    }

    pub fn get(&self, ratio: FibRatio) -> f64 {
        self.levels
            .iter()
            .find(|(r, _)| *r == ratio)
            .map(|&(_, p)| p)
            .unwrap_or(f64::NAN)
    }

    /// Look a level up by its label, e.g. `"0.618"`
    pub fn get_label(&self, label: &str) -> Option<f64> {
        label.parse::<FibRatio>().ok().map(|r| self.get(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = (FibRatio, f64)> + '_ {
        self.levels.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Serialize for FibonacciLevels {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.levels.len()))?;
        for (ratio, price) in &self.levels {
            map.serialize_entry(ratio.as_ref(), price)?;
        }
        map.end()
    }
}

/// Which troughs may anchor the swing low
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingOrdering {
    /// Highest peak and lowest trough, regardless of which comes first
    #[default]
    Undirected,
    /// Lowest trough dated before the highest peak
    LowBeforeHigh,
}

impl std::str::FromStr for SwingOrdering {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "undirected" => Ok(SwingOrdering::Undirected),
            "low_before_high" => Ok(SwingOrdering::LowBeforeHigh),
            other => Err(PatternError::InvalidConfig(format!(
                "unknown swing ordering '{other}'"
            ))),
        }
    }
}

/// Detected retracement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciRetracement {
    pub swing_high: f64,
    pub swing_low: f64,
    pub swing_high_index: usize,
    pub swing_low_index: usize,
    pub swing_high_date: NaiveDate,
    pub swing_low_date: NaiveDate,
    pub levels: FibonacciLevels,
    /// Absolute distance between the swings in price units
    pub range: f64,
    pub ordering: SwingOrdering,
    pub pattern_quality: &'static str,
}

/// Fibonacci retracement detector
#[derive(Debug, Clone, Copy, Default)]
pub struct FibonacciDetector {
    pub peaks: PeakFinder,
    pub ordering: SwingOrdering,
}

impl FibonacciDetector {
    /// Pick the anchoring swing pair from already located extrema
    pub fn select_swings(
        &self,
        peaks: &[SwingPoint],
        troughs: &[SwingPoint],
    ) -> Result<(SwingPoint, SwingPoint)> {
        let insufficient = || PatternError::InsufficientExtrema {
            peaks: peaks.len(),
            troughs: troughs.len(),
        };

        // first occurrence wins on ties
        let high = peaks
            .iter()
            .copied()
            .reduce(|best, p| if p.price > best.price { p } else { best })
            .ok_or_else(insufficient)?;

        let low = troughs
            .iter()
            .copied()
            .filter(|t| match self.ordering {
                SwingOrdering::Undirected => true,
                SwingOrdering::LowBeforeHigh => t.index < high.index,
            })
            .reduce(|best, t| if t.price < best.price { t } else { best })
            .ok_or_else(insufficient)?;

        Ok((high, low))
    }
}

impl SeriesDetector for FibonacciDetector {
    type Output = FibonacciRetracement;

    fn id(&self) -> DetectorId {
        DetectorId("fibonacci_retracements")
    }

    fn detect(&self, series: &PriceSeries) -> Result<FibonacciRetracement> {
        let peaks = self.peaks.find_peaks(series);
        let troughs = self.peaks.find_troughs(series);
        let (high, low) = self.select_swings(&peaks, &troughs)?;

        let range = ensure_finite(self.id(), "range", (high.price - low.price).abs())?;

        Ok(FibonacciRetracement {
            swing_high: high.price,
            swing_low: low.price,
            swing_high_index: high.index,
            swing_low_index: low.index,
            swing_high_date: high.date,
            swing_low_date: low.date,
            levels: FibonacciLevels::from_swings(high.price, low.price),
            range,
            ordering: self.ordering,
            pattern_quality: "strong",
        })
    }

    fn validate_config(&self) -> Result<()> {
        self.peaks.validate()
    }
}
