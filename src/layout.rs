//! 3D coordinates for rendering a price series.
//!
//! Each [`LayoutMode`] maps series index `i` and its normalized close to one
//! [`SpatialPoint`]. Modes other than [`LayoutMode::VerticalColumn`] can fail
//! on non-finite coordinates; [`SpatialLayoutGenerator::generate`] then falls
//! back to the vertical column.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detectors::helpers::{GOLDEN_ANGLE, NORMALIZE_EPSILON};
use crate::detectors::{FibRatio, FibonacciLevels};
use crate::{PatternError, PriceSeries, Result};

/// Layout strategy, chosen by the caller
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::EnumIter,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LayoutMode {
    /// x = z = 0, height is the normalized price
    VerticalColumn,
    /// Golden-angle spiral with `sqrt(i)` radius, height is the normalized price
    #[default]
    RibbonSpiral,
    /// Golden-angle spiral with linear radius and linear height
    GoldenSpiral,
    /// Ribbon spiral whose height is the bar's high-low range
    CandleSpiral,
}

impl LayoutMode {
    /// Multiplier applied to normalized prices for this mode's height axis
    #[inline]
    pub fn ring_scale(self) -> f64 {
        match self {
            LayoutMode::VerticalColumn => 100.0,
            _ => 60.0,
        }
    }
}

/// Open/high/low/close carried by candle-spiral points
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandleValues {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// One series index placed in 3D
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpatialPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub price: f64,
    pub date: NaiveDate,
    pub index: usize,
    #[serde(flatten)]
    pub candle: Option<CandleValues>,
}

/// Fibonacci level overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FibonacciRing {
    pub level: FibRatio,
    pub y: f64,
    pub price: f64,
    pub color: &'static str,
    pub is_golden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub const CAMERA_POSITION: Vec3 = Vec3 { x: 40.0, y: 30.0, z: 40.0 };
pub const CAMERA_LOOK_AT: Vec3 = Vec3 { x: 0.0, y: 25.0, z: 0.0 };

/// Everything a renderer needs for one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualizationData {
    /// Mode actually used, after any fallback
    #[serde(rename = "type")]
    pub layout_type: LayoutMode,
    pub points: Vec<SpatialPoint>,
    pub fibonacci_rings: Vec<FibonacciRing>,
    pub camera_position: Vec3,
    pub camera_look_at: Vec3,
}

/// Min-max normalize to `[0, 1)`; a constant series maps to zeros
pub fn normalize(prices: &[f64]) -> Vec<f64> {
    let (min, max) = price_bounds(prices);
    prices
        .iter()
        .map(|p| (p - min) / (max - min + NORMALIZE_EPSILON))
        .collect()
}

fn price_bounds(prices: &[f64]) -> (f64, f64) {
    let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

/// Spiral position for index `i` at the given radius
#[inline]
fn spiral(i: usize, radius: f64) -> (f64, f64) {
    let angle = i as f64 * GOLDEN_ANGLE;
    (radius * angle.cos(), radius * angle.sin())
}

/// Maps series to spatial points under a [`LayoutMode`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialLayoutGenerator {
    mode: LayoutMode,
}

impl SpatialLayoutGenerator {
    pub fn new(mode: LayoutMode) -> Self {
        Self { mode }
    }

    /// Configured default mode
    #[inline]
    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    /// Build points for `mode`, failing on any non-finite coordinate
    pub fn try_generate(&self, series: &PriceSeries, mode: LayoutMode) -> Result<Vec<SpatialPoint>> {
        let points = build_points(series, mode);
        if let Some(bad) = points
            .iter()
            .find(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(PatternError::NumericFault {
                detector: "layout",
                reason: format!("non-finite coordinate at index {} in {mode}", bad.index),
            });
        }
        Ok(points)
    }

    /// Vertical column layout. Only closes are read, so every coordinate is finite.
    pub fn vertical_column(&self, series: &PriceSeries) -> Vec<SpatialPoint> {
        build_points(series, LayoutMode::VerticalColumn)
    }

    /// Build points for `mode`, falling back to the vertical column on failure.
    /// Returns the mode actually used.
    pub fn generate(&self, series: &PriceSeries, mode: LayoutMode) -> (LayoutMode, Vec<SpatialPoint>) {
        match self.try_generate(series, mode) {
            Ok(points) => (mode, points),
            Err(err) => {
                warn!(requested = %mode, error = %err, "layout failed, using vertical_column");
                (LayoutMode::VerticalColumn, self.vertical_column(series))
            }
        }
    }

    /// Ring overlays for each Fibonacci level, scaled like `mode`'s price axis
    pub fn fibonacci_rings(
        &self,
        levels: &FibonacciLevels,
        prices: &[f64],
        mode: LayoutMode,
    ) -> Vec<FibonacciRing> {
        let (min, max) = price_bounds(prices);
        let scale = mode.ring_scale();
        levels
            .iter()
            .map(|(level, price)| FibonacciRing {
                level,
                y: (price - min) / (max - min + NORMALIZE_EPSILON) * scale,
                price,
                color: level.color(),
                is_golden: level.is_golden(),
            })
            .collect()
    }

    /// Points, rings and camera for one series
    pub fn visualization(
        &self,
        series: &PriceSeries,
        levels: Option<&FibonacciLevels>,
        mode: LayoutMode,
    ) -> VisualizationData {
        let (layout_type, points) = self.generate(series, mode);
        let fibonacci_rings = levels
            .map(|levels| self.fibonacci_rings(levels, series.closes(), layout_type))
            .unwrap_or_default();

        VisualizationData {
            layout_type,
            points,
            fibonacci_rings,
            camera_position: CAMERA_POSITION,
            camera_look_at: CAMERA_LOOK_AT,
        }
    }
}

/// One point per bar in `mode`, without finiteness checks
fn build_points(series: &PriceSeries, mode: LayoutMode) -> Vec<SpatialPoint> {
    let normalized = normalize(series.closes());

    series
        .bars()
        .iter()
        .zip(&normalized)
        .enumerate()
        .map(|(i, (bar, &norm))| {
            let (x, y, z, candle) = match mode {
                LayoutMode::VerticalColumn => (0.0, norm * 100.0, 0.0, None),
                LayoutMode::RibbonSpiral => {
                    let (x, z) = spiral(i, (i as f64).sqrt() * 0.3);
                    (x, norm * 60.0, z, None)
                }
                LayoutMode::GoldenSpiral => {
                    let (x, z) = spiral(i, i as f64 * 0.05);
                    (x, i as f64 * 0.05, z, None)
                }
                LayoutMode::CandleSpiral => {
                    let candle = CandleValues {
                        open: bar.open.unwrap_or(bar.close),
                        high: bar.high.unwrap_or(bar.close),
                        low: bar.low.unwrap_or(bar.close),
                        close: bar.close,
                    };
                    let (x, z) = spiral(i, (i as f64).sqrt() * 0.3);
                    (x, (candle.high - candle.low) * 0.02, z, Some(candle))
                }
            };
            SpatialPoint {
                x,
                y,
                z,
                price: bar.close,
                date: bar.date,
                index: i,
                candle,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceBar;
    use strum::IntoEnumIterator;

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap() + chrono::Days::new(n)
    }

    fn series(prices: &[f64]) -> PriceSeries {
        PriceSeries::from_closes(day(0), prices).unwrap()
    }

    #[test]
    fn test_normalize_bounds() {
        let normalized = normalize(&[10.0, 20.0, 15.0]);
        assert_eq!(normalized[0], 0.0);
        assert!(normalized[1] < 1.0 && normalized[1] > 0.999_999);
        assert!((normalized[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_constant_series_normalizes_to_zero() {
        assert!(normalize(&[7.0, 7.0, 7.0]).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_vertical_column() {
        let generator = SpatialLayoutGenerator::new(LayoutMode::VerticalColumn);
        let points = generator.try_generate(&series(&[1.0, 3.0]), LayoutMode::VerticalColumn).unwrap();
        assert_eq!(points[0].y, 0.0);
        assert!((points[1].y - 100.0).abs() < 1e-6);
        assert!(points.iter().all(|p| p.x == 0.0 && p.z == 0.0));
    }

    #[test]
    fn test_ribbon_spiral_geometry() {
        let generator = SpatialLayoutGenerator::default();
        let points = generator.try_generate(&series(&[1.0, 2.0, 3.0, 4.0, 5.0]), LayoutMode::RibbonSpiral).unwrap();
        assert_eq!(points[0].x, 0.0);
        let radius = (points[4].x.powi(2) + points[4].z.powi(2)).sqrt();
        assert!((radius - 0.6).abs() < 1e-9);
        assert!((points[4].y - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_golden_spiral_height_follows_index() {
        let generator = SpatialLayoutGenerator::default();
        let points = generator.try_generate(&series(&[5.0, 1.0, 9.0]), LayoutMode::GoldenSpiral).unwrap();
        assert!((points[2].y - 0.1).abs() < 1e-12);
        let radius = (points[2].x.powi(2) + points[2].z.powi(2)).sqrt();
        assert!((radius - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_candle_spiral_substitutes_close() {
        let generator = SpatialLayoutGenerator::default();
        let points = generator.try_generate(&series(&[5.0, 6.0]), LayoutMode::CandleSpiral).unwrap();
        let candle = points[1].candle.unwrap();
        assert_eq!((candle.open, candle.high, candle.low, candle.close), (6.0, 6.0, 6.0, 6.0));
        assert_eq!(points[1].y, 0.0);
    }

    #[test]
    fn test_candle_spiral_height_is_range() {
        let bars = [
            PriceBar::new(day(0), 100.0).with_ohlc(98.0, 150.0, 50.0),
            PriceBar::new(day(1), 101.0).with_ohlc(100.0, 102.0, 99.0),
        ];
        let series = PriceSeries::from_bars(&bars).unwrap();
        let points = SpatialLayoutGenerator::default().try_generate(&series, LayoutMode::CandleSpiral).unwrap();
        assert!((points[0].y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nan_high_falls_back_to_vertical_column() {
        let bars = [
            PriceBar::new(day(0), 100.0).with_ohlc(100.0, f64::NAN, 90.0),
            PriceBar::new(day(1), 110.0),
        ];
        let series = PriceSeries::from_bars(&bars).unwrap();
        let generator = SpatialLayoutGenerator::new(LayoutMode::CandleSpiral);

        assert!(generator.try_generate(&series, LayoutMode::CandleSpiral).is_err());

        let (used, points) = generator.generate(&series, LayoutMode::CandleSpiral);
        assert_eq!(used, LayoutMode::VerticalColumn);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.candle.is_none()));
    }

    #[test]
    fn test_fallback_keeps_one_point_per_bar() {
        let bars: Vec<PriceBar> = (0..50)
            .map(|i| {
                let close = 100.0 + i as f64;
                let bar = PriceBar::new(day(i), close);
                if i == 25 {
                    bar.with_ohlc(close, f64::INFINITY, close)
                } else {
                    bar
                }
            })
            .collect();
        let series = PriceSeries::from_bars(&bars).unwrap();
        let generator = SpatialLayoutGenerator::default();

        let (used, points) = generator.generate(&series, LayoutMode::CandleSpiral);
        assert_eq!(used, LayoutMode::VerticalColumn);
        assert_eq!(points, generator.vertical_column(&series));
        assert_eq!(points.len(), 50);
        assert!(points.iter().all(|p| p.y.is_finite() && p.x == 0.0 && p.z == 0.0));
    }

    #[test]
    fn test_every_mode_keeps_index_order() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64).sin() * 10.0).collect();
        let series = series(&prices);
        let generator = SpatialLayoutGenerator::default();
        for mode in LayoutMode::iter() {
            let (used, points) = generator.generate(&series, mode);
            assert_eq!(used, mode);
            assert_eq!(points.len(), prices.len());
            assert!(points.iter().enumerate().all(|(i, p)| p.index == i && p.price == prices[i]));
        }
    }

    #[test]
    fn test_rings_colors_and_scale() {
        let levels = FibonacciLevels::from_swings(200.0, 100.0);
        let generator = SpatialLayoutGenerator::default();
        let rings = generator.fibonacci_rings(&levels, &[100.0, 200.0], LayoutMode::VerticalColumn);
        assert_eq!(rings.len(), 9);

        let golden = rings.iter().find(|r| r.level == FibRatio::R618).unwrap();
        assert_eq!(golden.color, "#FFD700");
        assert!(golden.is_golden);
        assert!((golden.y - 61.8).abs() < 1e-4);

        let extension = rings.iter().find(|r| r.level == FibRatio::R1272).unwrap();
        assert_eq!(extension.color, "#7BA591");
        assert!(!extension.is_golden);
    }

    #[test]
    fn test_visualization_serializes_type_and_camera() {
        let series = series(&[1.0, 2.0, 3.0]);
        let data = SpatialLayoutGenerator::default().visualization(&series, None, LayoutMode::GoldenSpiral);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["type"], "golden_spiral");
        assert_eq!(json["camera_position"]["x"], 40.0);
        assert_eq!(json["camera_look_at"]["y"], 25.0);
        assert_eq!(json["fibonacci_rings"].as_array().unwrap().len(), 0);
        assert!(json["points"][0].get("open").is_none());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(LayoutMode::CandleSpiral.to_string(), "candle_spiral");
        assert_eq!("ribbon_spiral".parse::<LayoutMode>().unwrap(), LayoutMode::RibbonSpiral);
        assert_eq!(LayoutMode::default(), LayoutMode::RibbonSpiral);
    }
}
