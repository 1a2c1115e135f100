//! Report assembled from all detector sections, plus the human-readable insights.

use std::fmt::Display;

use serde::Serialize;

use crate::detectors::{
    CyclePattern, ExponentialPhase, FibRatio, FibonacciRetracement, GoldenRatioScan, SeriesSummary,
};
use crate::layout::VisualizationData;
use crate::{Result, Section};

/// The five detector sections, keyed by report name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patterns {
    pub fibonacci_retracements: Section<FibonacciRetracement>,
    pub exponential_growth: Section<ExponentialPhase>,
    pub market_cycles: Section<CyclePattern>,
    pub golden_ratios: Section<GoldenRatioScan>,
    pub statistics: Section<SeriesSummary>,
}

impl Patterns {
    /// Number of sections that produced a pattern
    pub fn found_count(&self) -> usize {
        [
            self.fibonacci_retracements.is_found(),
            self.exponential_growth.is_found(),
            self.market_cycles.is_found(),
            self.golden_ratios.is_found(),
            self.statistics.is_found(),
        ]
        .into_iter()
        .filter(|&found| found)
        .count()
    }
}

/// Complete analysis of one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub dataset_type: String,
    pub patterns: Patterns,
    pub visualization_data: VisualizationData,
    pub insights: Vec<String>,
}

/// What a caller prints: a report, or a single-field error object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportEnvelope {
    Report(Box<AnalysisReport>),
    Failure { error: String },
}

impl ReportEnvelope {
    pub fn failure(error: impl Display) -> Self {
        ReportEnvelope::Failure {
            error: error.to_string(),
        }
    }

    pub fn from_result(result: Result<AnalysisReport>) -> Self {
        match result {
            Ok(report) => ReportEnvelope::Report(Box::new(report)),
            Err(error) => Self::failure(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReportEnvelope::Failure { .. })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Whole-unit currency with thousands separators, e.g. `$12,345`
pub fn format_currency(value: f64) -> String {
    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && rounded != "0" { "-" } else { "" };
    format!("{sign}${grouped}")
}

/// Insight lines in section order: statistics, Fibonacci, exponential, cycles, golden ratios
pub fn generate_insights(patterns: &Patterns) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(stats) = patterns.statistics.found() {
        insights.push(format!("Analyzed {} days of price data", stats.total_days));
        insights.push(format!(
            "Price range: {} → {}",
            format_currency(stats.price_min),
            format_currency(stats.price_max)
        ));
        if stats.total_growth > 0.0 {
            insights.push(format!("Overall growth: +{:.1}%", stats.total_growth));
        } else {
            insights.push(format!("Overall change: {:.1}%", stats.total_growth));
        }
    }

    if let Some(fib) = patterns.fibonacci_retracements.found() {
        insights.push(format!(
            "Detected {} Fibonacci retracement levels",
            fib.levels.len()
        ));
        insights.push(format!(
            "Golden ratio support at {}",
            format_currency(fib.levels.get(FibRatio::R618))
        ));
        insights.push(format!(
            "Major swing: {} to {}",
            format_currency(fib.swing_low),
            format_currency(fib.swing_high)
        ));
    }

    if let Some(exp) = patterns.exponential_growth.found() {
        insights.push(format!(
            "Exponential bull market: {:.1}x growth over {} days",
            exp.growth_multiple, exp.duration_days
        ));
        insights.push(format!("Exponential fit quality: R² = {:.3}", exp.r_squared));
    }

    if let Some(cycle) = patterns.market_cycles.found() {
        insights.push(format!(
            "Market cycles detected: ~{:.1} month periods",
            cycle.cycle_period_months
        ));
        insights.push(format!(
            "Found {} complete boom-bust cycles",
            cycle.num_cycles
        ));
    }

    if let Some(golden) = patterns.golden_ratios.found() {
        if golden.found_count > 0 {
            insights.push(format!(
                "Found {} price movements following the golden ratio (φ = 1.618)",
                golden.found_count
            ));
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PatternError;
    use chrono::NaiveDate;

    fn summary(growth: f64) -> SeriesSummary {
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        SeriesSummary {
            total_days: 365,
            date_range_start: day,
            date_range_end: day,
            price_min: 3_850.4,
            price_max: 68_789.6,
            price_mean: 20_000.0,
            price_std: 5_000.0,
            total_growth: growth,
            volatility: 25.0,
        }
    }

    fn failed<T>() -> Section<T> {
        Section::Failed {
            error: PatternError::NoCyclesDetected,
        }
    }

    fn patterns_with_stats(growth: f64) -> Patterns {
        Patterns {
            fibonacci_retracements: failed(),
            exponential_growth: failed(),
            market_cycles: failed(),
            golden_ratios: Section::Found(GoldenRatioScan {
                found_count: 0,
                occurrences: Vec::new(),
            }),
            statistics: Section::Found(summary(growth)),
        }
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(999.4), "$999");
        assert_eq!(format_currency(1_000.0), "$1,000");
        assert_eq!(format_currency(68_789.6), "$68,790");
        assert_eq!(format_currency(1_234_567.0), "$1,234,567");
        assert_eq!(format_currency(-4_500.0), "-$4,500");
    }

    #[test]
    fn test_statistics_insights() {
        let insights = generate_insights(&patterns_with_stats(1600.26));
        assert_eq!(
            insights,
            vec![
                "Analyzed 365 days of price data".to_string(),
                "Price range: $3,850 → $68,790".to_string(),
                "Overall growth: +1600.3%".to_string(),
            ]
        );
    }

    #[test]
    fn test_negative_growth_is_change() {
        let insights = generate_insights(&patterns_with_stats(-12.34));
        assert_eq!(insights[2], "Overall change: -12.3%");
    }

    #[test]
    fn test_failed_sections_add_nothing() {
        let patterns = patterns_with_stats(1.0);
        assert_eq!(generate_insights(&patterns).len(), 3);
        assert_eq!(patterns.found_count(), 2);
    }

    #[test]
    fn test_envelope_failure_is_single_field() {
        let envelope = ReportEnvelope::from_result(Err(PatternError::MalformedInput(
            "missing close column".into(),
        )));
        assert!(envelope.is_failure());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["error"], "Malformed input: missing close column");
    }
}
