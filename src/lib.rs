//! # YARPD - Yet Another Recurring Pattern Detector
//!
//! Descriptive pattern analysis for daily price series: Fibonacci retracements,
//! exponential growth phases, dominant market cycles and golden-ratio peak
//! relationships, plus summary statistics and a 3D layout for visualization.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use yarpd::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
//! let closes: Vec<f64> = (0..365)
//!     .map(|t| 1000.0 + 200.0 * (t as f64 / 20.0).sin() + t as f64)
//!     .collect();
//! let series = PriceSeries::from_closes(start, &closes).unwrap();
//!
//! let analyzer = AnalyzerBuilder::new()
//!     .peak_distance(10)
//!     .prominence(50.0)
//!     .layout(LayoutMode::RibbonSpiral)
//!     .build()
//!     .unwrap();
//!
//! let report = analyzer.analyze(&series);
//! assert!(report.success);
//! assert_eq!(report.visualization_data.points.len(), closes.len());
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod detectors;
pub mod layout;
pub mod loader;
pub mod params;
pub mod report;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Layout
        layout::{FibonacciRing, LayoutMode, SpatialLayoutGenerator, SpatialPoint, VisualizationData},
        // Loading
        loader::{load_csv, load_csv_reader},
        // Parameters
        params::{get_period, get_ratio, get_threshold, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        analyze_parallel,
        // Report
        report::{AnalysisReport, Patterns, ReportEnvelope},
        // Engine
        AnalysisConfig,
        Analyzer,
        AnalyzerBuilder,
        // Types
        DailyPrice,
        DetectorId,
        // Errors
        PatternError,
        Period,
        PriceBar,
        PriceSeries,
        Ratio,
        Result,
        SeriesDetector,
        SeriesError,
        SeriesReport,
        Section,
        SwingPoint,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur while loading a series or detecting a pattern
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} points, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Not enough peaks/troughs found ({peaks} peaks, {troughs} troughs)")]
    InsufficientExtrema { peaks: usize, troughs: usize },

    #[error("Bull market segment too short: need {need} points, got {got}")]
    SegmentTooShort { need: usize, got: usize },

    #[error("Exponential fit failed: {0}")]
    CurveFit(String),

    #[error("No significant cycles detected")]
    NoCyclesDetected,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Numeric fault in {detector}: {reason}")]
    NumericFault {
        detector: &'static str,
        reason: String,
    },
}

impl Serialize for PatternError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Sample count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// PRICE DATA
// ============================================================

/// Daily price record. Only the date and close are required.
pub trait DailyPrice {
    fn date(&self) -> NaiveDate;
    fn close(&self) -> f64;

    fn open(&self) -> Option<f64> {
        None
    }

    fn high(&self) -> Option<f64> {
        None
    }

    fn low(&self) -> Option<f64> {
        None
    }
}

/// Owned daily bar as stored inside a [`PriceSeries`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
}

impl PriceBar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            open: None,
            high: None,
            low: None,
        }
    }

    pub fn with_ohlc(mut self, open: f64, high: f64, low: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self
    }
}

impl DailyPrice for PriceBar {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn open(&self) -> Option<f64> {
        self.open
    }

    fn high(&self) -> Option<f64> {
        self.high
    }

    fn low(&self) -> Option<f64> {
        self.low
    }
}

/// Validated, immutable daily price series.
///
/// Invariants: at least one bar, strictly increasing dates, every close finite
/// and positive. Open/high/low are carried as given; only the candle layout
/// reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
    closes: Vec<f64>,
}

impl PriceSeries {
    /// Build a series from any [`DailyPrice`] records, validating invariants
    pub fn from_bars<T: DailyPrice>(records: &[T]) -> Result<Self> {
        if records.is_empty() {
            return Err(PatternError::InsufficientData { need: 1, got: 0 });
        }

        let mut bars = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let close = record.close();
            if !close.is_finite() || close <= 0.0 {
                return Err(PatternError::MalformedInput(format!(
                    "close at row {i} must be a positive finite number, got {close}"
                )));
            }
            if let Some(prev) = bars.last().map(|b: &PriceBar| b.date) {
                if record.date() <= prev {
                    return Err(PatternError::MalformedInput(format!(
                        "dates must be strictly increasing: row {i} ({}) follows {prev}",
                        record.date()
                    )));
                }
            }
            bars.push(PriceBar {
                date: record.date(),
                close,
                open: record.open(),
                high: record.high(),
                low: record.low(),
            });
        }

        let closes = bars.iter().map(|b| b.close).collect();
        Ok(Self { bars, closes })
    }

    /// Build a series of consecutive calendar days starting at `start`
    pub fn from_closes(start: NaiveDate, closes: &[f64]) -> Result<Self> {
        let bars: Vec<PriceBar> = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| PriceBar::new(date, close))
            .collect();
        Self::from_bars(&bars)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    #[inline]
    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    #[inline]
    pub fn date(&self, index: usize) -> NaiveDate {
        self.bars[index].date
    }

    /// Swing point at `index`, panicking if out of bounds
    pub fn swing_at(&self, index: usize) -> SwingPoint {
        SwingPoint {
            index,
            date: self.bars[index].date,
            price: self.closes[index],
        }
    }
}

/// Local extremum located by the peak finder
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwingPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Unique identifier for a detector, used as the report key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DetectorId(pub &'static str);

impl DetectorId {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// A whole-series pattern detector
pub trait SeriesDetector: Send + Sync {
    type Output;

    fn id(&self) -> DetectorId;

    fn detect(&self, series: &PriceSeries) -> Result<Self::Output>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// Outcome of one detector: the pattern, or the reason it could not be produced.
///
/// Serializes as the pattern's own fields, or as `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Found(T),
    Failed { error: PatternError },
}

impl<T> Section<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Section::Found(value) => Some(value),
            Section::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PatternError> {
        match self {
            Section::Found(_) => None,
            Section::Failed { error } => Some(error),
        }
    }

    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, Section::Found(_))
    }
}

impl<T> From<Result<T>> for Section<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Section::Found(value),
            Err(error) => Section::Failed { error },
        }
    }
}

/// Run a detector so that neither its error nor a panic escapes into sibling detectors
pub fn run_guarded<D: SeriesDetector>(detector: &D, series: &PriceSeries) -> Section<D::Output> {
    let id = detector.id().as_str();
    match panic::catch_unwind(AssertUnwindSafe(|| detector.detect(series))) {
        Ok(Ok(output)) => {
            debug!(detector = id, "pattern detected");
            Section::Found(output)
        }
        Ok(Err(error)) => {
            warn!(detector = id, %error, "detector produced no pattern");
            Section::Failed { error }
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unexpected panic".to_string());
            warn!(detector = id, %reason, "detector panicked");
            Section::Failed {
                error: PatternError::NumericFault {
                    detector: id,
                    reason,
                },
            }
        }
    }
}

// ============================================================
// CONFIGURATION
// ============================================================

/// Analyzer configuration. Every field has a default, so a partial JSON
/// document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum sample distance between two peaks
    pub distance: usize,
    /// Minimum peak prominence in absolute price units
    pub prominence: f64,
    /// Relative tolerance for golden-ratio matches
    pub golden_tolerance: f64,
    /// Number of golden-ratio occurrences kept in the report
    pub max_golden_matches: usize,
    /// Minimum exponential segment length
    pub min_segment_len: usize,
    /// Backward extension tolerance for the exponential run start
    pub start_tolerance: f64,
    /// Function evaluation budget for the exponential curve fit
    pub max_evaluations: usize,
    pub swing_ordering: SwingOrdering,
    pub layout: layout::LayoutMode,
    pub dataset_type: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            distance: detectors::DEFAULT_PEAK_DISTANCE,
            prominence: detectors::DEFAULT_PROMINENCE,
            golden_tolerance: detectors::GOLDEN_TOLERANCE,
            max_golden_matches: detectors::MAX_GOLDEN_MATCHES,
            min_segment_len: detectors::MIN_SEGMENT_LEN,
            start_tolerance: detectors::START_TOLERANCE,
            max_evaluations: detectors::MAX_FUNCTION_EVALUATIONS,
            swing_ordering: SwingOrdering::default(),
            layout: layout::LayoutMode::default(),
            dataset_type: "price_series".to_string(),
        }
    }
}

impl AnalysisConfig {
    /// Override numeric parameters by name, validating each against its metadata
    pub fn apply_params(&mut self, overrides: &HashMap<&str, f64>) -> Result<()> {
        for (&name, &value) in overrides {
            let meta = params::find_meta(name)
                .ok_or_else(|| PatternError::InvalidConfig(format!("unknown parameter '{name}'")))?;
            meta.validate(value)?;
            match name {
                "distance" => self.distance = value as usize,
                "prominence" => self.prominence = value,
                "golden_tolerance" => self.golden_tolerance = value,
                "max_golden_matches" => self.max_golden_matches = value as usize,
                "min_segment_len" => self.min_segment_len = value as usize,
                "start_tolerance" => self.start_tolerance = value,
                "max_evaluations" => self.max_evaluations = value as usize,
                other => {
                    return Err(PatternError::InvalidConfig(format!(
                        "parameter '{other}' cannot be set on the analyzer"
                    )))
                }
            }
        }
        Ok(())
    }

    fn peak_finder(&self) -> Result<PeakFinder> {
        PeakFinder::new(self.distance, self.prominence)
    }
}

use detectors::{
    CycleDetector, ExponentialPhaseDetector, FibonacciDetector, GoldenRatioMatcher, PeakFinder,
    SeriesStats, SwingOrdering,
};

// ============================================================
// ANALYZER
// ============================================================

/// Runs every detector over a series and assembles the report
#[derive(Debug, Clone)]
pub struct Analyzer {
    stats: SeriesStats,
    fibonacci: FibonacciDetector,
    exponential: ExponentialPhaseDetector,
    cycles: CycleDetector,
    golden: GoldenRatioMatcher,
    layout: layout::SpatialLayoutGenerator,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let peaks = config.peak_finder()?;
        let analyzer = Self {
            stats: SeriesStats,
            fibonacci: FibonacciDetector {
                peaks,
                ordering: config.swing_ordering,
            },
            exponential: ExponentialPhaseDetector {
                min_segment_len: config.min_segment_len,
                start_tolerance: config.start_tolerance,
                max_evaluations: config.max_evaluations,
            },
            cycles: CycleDetector,
            golden: GoldenRatioMatcher {
                peaks,
                tolerance: Ratio::new(config.golden_tolerance)?,
                max_matches: config.max_golden_matches,
            },
            layout: layout::SpatialLayoutGenerator::new(config.layout),
            config,
        };
        analyzer.validate()?;
        Ok(analyzer)
    }

    #[inline]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run all five detectors. Each failure stays inside its own section.
    pub fn detect_patterns(&self, series: &PriceSeries) -> report::Patterns {
        report::Patterns {
            fibonacci_retracements: run_guarded(&self.fibonacci, series),
            exponential_growth: run_guarded(&self.exponential, series),
            market_cycles: run_guarded(&self.cycles, series),
            golden_ratios: run_guarded(&self.golden, series),
            statistics: run_guarded(&self.stats, series),
        }
    }

    /// Analyze with the configured layout mode
    pub fn analyze(&self, series: &PriceSeries) -> report::AnalysisReport {
        self.analyze_with_layout(series, self.layout.mode())
    }

    /// Analyze with an explicit layout mode
    pub fn analyze_with_layout(
        &self,
        series: &PriceSeries,
        mode: layout::LayoutMode,
    ) -> report::AnalysisReport {
        let patterns = self.detect_patterns(series);
        let levels = patterns.fibonacci_retracements.found().map(|f| &f.levels);
        let visualization_data = self.layout.visualization(series, levels, mode);
        let insights = report::generate_insights(&patterns);

        info!(
            points = series.len(),
            layout = %visualization_data.layout_type,
            insights = insights.len(),
            "analysis complete"
        );

        report::AnalysisReport {
            success: true,
            dataset_type: self.config.dataset_type.clone(),
            patterns,
            visualization_data,
            insights,
        }
    }

    /// Validate raw records and analyze them. Malformed input fails the whole call.
    pub fn analyze_bars<T: DailyPrice>(&self, records: &[T]) -> Result<report::AnalysisReport> {
        let series = PriceSeries::from_bars(records)?;
        Ok(self.analyze(&series))
    }

    fn validate(&self) -> Result<()> {
        self.stats.validate_config()?;
        self.fibonacci.validate_config()?;
        self.exponential.validate_config()?;
        self.cycles.validate_config()?;
        self.golden.validate_config()?;
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating Analyzer instances
#[derive(Debug, Clone, Default)]
pub struct AnalyzerBuilder {
    config: AnalysisConfig,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn peak_distance(mut self, distance: usize) -> Self {
        self.config.distance = distance;
        self
    }

    pub fn prominence(mut self, prominence: f64) -> Self {
        self.config.prominence = prominence;
        self
    }

    pub fn golden_tolerance(mut self, tolerance: f64) -> Self {
        self.config.golden_tolerance = tolerance;
        self
    }

    pub fn max_golden_matches(mut self, max: usize) -> Self {
        self.config.max_golden_matches = max;
        self
    }

    pub fn min_segment_len(mut self, len: usize) -> Self {
        self.config.min_segment_len = len;
        self
    }

    pub fn start_tolerance(mut self, tolerance: f64) -> Self {
        self.config.start_tolerance = tolerance;
        self
    }

    pub fn max_evaluations(mut self, max: usize) -> Self {
        self.config.max_evaluations = max;
        self
    }

    pub fn swing_ordering(mut self, ordering: SwingOrdering) -> Self {
        self.config.swing_ordering = ordering;
        self
    }

    pub fn layout(mut self, mode: layout::LayoutMode) -> Self {
        self.config.layout = mode;
        self
    }

    pub fn dataset_type(mut self, label: impl Into<String>) -> Self {
        self.config.dataset_type = label.into();
        self
    }

    /// Build the analyzer
    pub fn build(self) -> Result<Analyzer> {
        Analyzer::new(self.config)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Report for a single named series
#[derive(Debug)]
pub struct SeriesReport {
    pub symbol: String,
    pub report: report::AnalysisReport,
}

/// Error from loading a single named series
#[derive(Debug)]
pub struct SeriesError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel analysis of multiple series
pub fn analyze_parallel<'a, T, I>(
    analyzer: &Analyzer,
    instruments: I,
) -> (Vec<SeriesReport>, Vec<SeriesError>)
where
    T: DailyPrice + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            analyzer
                .analyze_bars(bars)
                .map(|report| SeriesReport {
                    symbol: symbol.to_string(),
                    report,
                })
                .map_err(|error| SeriesError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap() + chrono::Days::new(n as u64)
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| 500.0 + 100.0 * (2.0 * std::f64::consts::PI * t as f64 / 50.0).sin())
            .collect()
    }

    struct Panicking;

    impl SeriesDetector for Panicking {
        type Output = ();

        fn id(&self) -> DetectorId {
            DetectorId("panicking")
        }

        fn detect(&self, _series: &PriceSeries) -> Result<()> {
            panic!("index out of bounds");
        }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(30).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_empty_series_rejected() {
        let bars: Vec<PriceBar> = Vec::new();
        assert_eq!(
            PriceSeries::from_bars(&bars),
            Err(PatternError::InsufficientData { need: 1, got: 0 })
        );
    }

    #[test]
    fn test_non_increasing_dates_rejected() {
        let bars = vec![PriceBar::new(day(1), 10.0), PriceBar::new(day(1), 11.0)];
        assert!(matches!(
            PriceSeries::from_bars(&bars),
            Err(PatternError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_non_positive_close_rejected() {
        let bars = vec![PriceBar::new(day(1), 10.0), PriceBar::new(day(2), 0.0)];
        assert!(matches!(
            PriceSeries::from_bars(&bars),
            Err(PatternError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_from_closes_consecutive_days() {
        let series = PriceSeries::from_closes(day(0), &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.date(2), day(2));
        assert_eq!(series.closes(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_builder_defaults() {
        let analyzer = AnalyzerBuilder::new().build().unwrap();
        assert_eq!(analyzer.config().distance, 30);
        assert_eq!(analyzer.config().prominence, 1000.0);
        assert_eq!(analyzer.config().dataset_type, "price_series");
    }

    #[test]
    fn test_builder_rejects_bad_config() {
        assert!(AnalyzerBuilder::new().peak_distance(0).build().is_err());
        assert!(AnalyzerBuilder::new().prominence(-1.0).build().is_err());
        assert!(AnalyzerBuilder::new().prominence(f64::NAN).build().is_err());
        assert!(AnalyzerBuilder::new().golden_tolerance(1.5).build().is_err());
        assert!(AnalyzerBuilder::new().start_tolerance(0.5).build().is_err());
        assert!(AnalyzerBuilder::new().min_segment_len(1).build().is_err());
        assert!(AnalyzerBuilder::new().max_evaluations(0).build().is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"distance": 12, "layout": "golden_spiral"}"#).unwrap();
        assert_eq!(config.distance, 12);
        assert_eq!(config.prominence, 1000.0);
        assert_eq!(config.layout, layout::LayoutMode::GoldenSpiral);
    }

    #[test]
    fn test_apply_params() {
        let mut config = AnalysisConfig::default();
        let overrides = HashMap::from([("distance", 10.0), ("prominence", 25.0)]);
        config.apply_params(&overrides).unwrap();
        assert_eq!(config.distance, 10);
        assert_eq!(config.prominence, 25.0);

        let unknown = HashMap::from([("nope", 1.0)]);
        assert!(config.apply_params(&unknown).is_err());
    }

    #[test]
    fn test_panicking_detector_is_contained() {
        let series = PriceSeries::from_closes(day(0), &[1.0, 2.0]).unwrap();
        let section = run_guarded(&Panicking, &series);
        assert!(matches!(
            section.error(),
            Some(PatternError::NumericFault { detector: "panicking", .. })
        ));
    }

    #[test]
    fn test_failed_section_serializes_as_error_object() {
        let section: Section<u32> = Section::Failed {
            error: PatternError::NoCyclesDetected,
        };
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json, serde_json::json!({"error": "No significant cycles detected"}));
    }

    #[test]
    fn test_analyze_single_point() {
        let analyzer = AnalyzerBuilder::new().build().unwrap();
        let series = PriceSeries::from_closes(day(0), &[42.0]).unwrap();
        let report = analyzer.analyze(&series);

        assert!(report.success);
        assert!(report.patterns.statistics.is_found());
        assert!(!report.patterns.fibonacci_retracements.is_found());
        assert!(!report.patterns.exponential_growth.is_found());
        assert!(!report.patterns.market_cycles.is_found());
        assert_eq!(report.visualization_data.points.len(), 1);
    }

    #[test]
    fn test_curve_fit_failure_stays_in_its_section() {
        let analyzer = AnalyzerBuilder::new().max_evaluations(3).build().unwrap();
        let closes: Vec<f64> = (0..200)
            .map(|t| {
                let t = t as f64;
                100.0 * (0.02 * t).exp() * (1.0 + 0.02 * (1.7 * t).sin())
            })
            .collect();
        let series = PriceSeries::from_closes(day(0), &closes).unwrap();
        let report = analyzer.analyze(&series);

        assert!(report.success);
        assert!(matches!(
            report.patterns.exponential_growth.error(),
            Some(PatternError::CurveFit(_))
        ));
        assert!(report.patterns.statistics.is_found());
        assert_eq!(report.visualization_data.points.len(), 200);

        let json = serde_json::to_value(&report.patterns).unwrap();
        let message = json["exponential_growth"]["error"].as_str().unwrap();
        assert!(message.starts_with("Exponential fit failed"), "{message}");
    }

    #[test]
    fn test_analyze_bars_rejects_empty() {
        let analyzer = AnalyzerBuilder::new().build().unwrap();
        let bars: Vec<PriceBar> = Vec::new();
        assert!(analyzer.analyze_bars(&bars).is_err());
    }

    #[test]
    fn test_parallel_analysis() {
        let analyzer = AnalyzerBuilder::new()
            .peak_distance(10)
            .prominence(50.0)
            .build()
            .unwrap();

        let good: Vec<PriceBar> = wave(200)
            .into_iter()
            .enumerate()
            .map(|(i, c)| PriceBar::new(day(i as u32), c))
            .collect();
        let bad: Vec<PriceBar> = Vec::new();

        let instruments: Vec<(&str, &[PriceBar])> = vec![("WAVE", &good), ("EMPTY", &bad)];
        let (reports, errors) = analyze_parallel(&analyzer, instruments);

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].symbol, "WAVE");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol, "EMPTY");
    }
}
