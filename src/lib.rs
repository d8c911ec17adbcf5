//! # breakscan - range breakout screener
//!
//! Scans daily OHLCV series for range breakouts confirmed by a volume surge,
//! and replays the scan as of a past date for backtest research.
//!
//! ## Quick Start
//!
//! ```rust
//! use breakscan::prelude::*;
//! use chrono::NaiveDate;
//!
//! // Fast and Slow range-break variants, last 10 days eligible
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .recent_window_days(10)
//!     .build()
//!     .unwrap();
//!
//! let symbol = SymbolDescriptor::new("7203", "Toyota Motor");
//! let day = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
//! let series = vec![PricePoint::new(day, 100.0, 101.0, 99.0, 100.5, 1_000.0)];
//!
//! let input = ScreeningInput::new(&symbol, &series);
//! assert!(engine.validate(&input).is_valid());
//!
//! // Far too little history for either variant: no matches, no error
//! let matches = engine.screen_symbol(&input).unwrap();
//! assert!(matches.is_empty());
//! ```

use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub mod detectors;
pub mod params;
pub mod point_in_time;
pub mod query;
pub mod source;
pub mod validation;
pub mod volume;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Parameters
        params::{
            get_flag, get_period, get_threshold, DetectionParameters, EngineConfiguration, ParamMeta,
            ParamType, ParameterizedDetector, Preset,
        },
        // Historical orchestration
        point_in_time::{
            ForwardReturn, PointInTimeScreener, RunOptions, ScreenedMatch, ScreeningRunResult,
            FORWARD_OFFSETS,
        },
        // Filter / sort
        query::{DateRange, FilterCriteria, SortField, SortOrder, SortSpec},
        // Market data boundary
        source::{InMemoryMarket, MarketDataConnector, MarketDataReader, SourceError},
        // Validation
        validation::{DataWarning, InputError, ValidationReport},
        // Volume statistics
        volume::{AverageKind, VolumeAnalysis, VolumeProfile},
        BatchReport,
        BreakoutDetails,
        BuiltinDetector,
        Detection,
        DynDetector,
        EngineBuilder,
        MatchDetails,
        MatchRecord,
        Period,
        PricePoint,
        Progress,
        Result,
        ScreenError,
        ScreeningEngine,
        ScreeningInput,
        SeriesDetector,
        SkipReason,
        SymbolDescriptor,
        SymbolOutcome,
        Threshold,
        VariantId,
        OHLCV,
        OHLCVExt,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, ScreenError>;

/// Errors that can occur while configuring or running a screen
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScreenError {
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

    /// A single symbol's detector failed. Batches catch this per symbol.
    #[error("Detector {variant} failed: {reason}")]
    Detector { variant: VariantId, reason: String },

    /// The market-data collaborator could not be reached at all.
    #[error("Market data unavailable: {0}")]
    DataUnavailable(#[from] source::SourceError),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Strictly positive, finite multiplier (e.g. a volume surge threshold)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    /// Create a new Threshold, validating the value is finite and > 0
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(ScreenError::InvalidValue(
                "Threshold cannot be NaN or infinite",
            ));
        }
        if value <= 0.0 {
            return Err(ScreenError::OutOfRange {
                field: "Threshold",
                value,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
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

impl Serialize for Threshold {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Threshold {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Threshold::new(value).map_err(serde::de::Error::custom)
    }
}

/// Window length in trading days (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(ScreenError::InvalidValue("Period must be > 0"));
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
// OHLCV TRAITS
// ============================================================

/// One trading day of one symbol
pub trait OHLCV {
    fn date(&self) -> NaiveDate;
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;
}

/// Blanket impl for references to dyn OHLCV
impl OHLCV for &dyn OHLCV {
    fn date(&self) -> NaiveDate {
        (*self).date()
    }

    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }
}

/// Data-quality checks derived from OHLCV fields
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// `low <= {open, close} <= high`
    fn is_consistent(&self) -> bool {
        let body_hi = self.open().max(self.close());
        let body_lo = self.open().min(self.close());
        self.low() <= body_lo && body_hi <= self.high()
    }

    /// Any price field that is zero, negative or NaN
    fn has_non_positive_price(&self) -> bool {
        [self.open(), self.high(), self.low(), self.close()]
            .iter()
            .any(|v| !(*v > 0.0))
    }
}

impl<T: OHLCV> OHLCVExt for T {}

/// Concrete daily price point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for PricePoint {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Tradable instrument as listed by the market-data collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolDescriptor {
    pub code: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

impl SymbolDescriptor {
    pub fn new(code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            display_name: display_name.into(),
            scale_category: None,
            sector: None,
        }
    }

    pub fn with_scale_category(mut self, category: impl Into<String>) -> Self {
        self.scale_category = Some(category.into());
        self
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }
}

// ============================================================
// MATCH RECORDS
// ============================================================

/// Name of a detection variant ("range_break_fast", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(pub Cow<'static, str>);

impl VariantId {
    pub const FAST: VariantId = VariantId(Cow::Borrowed("range_break_fast"));
    pub const SLOW: VariantId = VariantId(Cow::Borrowed("range_break_slow"));

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Measurements behind a range-break match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakoutDetails {
    /// `(current_high - prior_period_max_high) / prior_period_max_high * 100`, 2 decimals
    pub break_percentage: f64,
    /// Short-window average volume over long-window average volume, 2 decimals
    pub volume_ratio: f64,
    pub short_window_avg_volume: f64,
    pub long_window_avg_volume: f64,
    /// Highest high of the recent window
    pub current_high: f64,
    /// Highest high of the history window before it
    pub prior_period_max_high: f64,
}

/// Detector-family specific payload of a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MatchDetails {
    RangeBreak(BreakoutDetails),
    /// Produced by user-supplied detectors
    Custom { score: f64 },
}

impl MatchDetails {
    #[inline]
    pub fn is_breakout(&self) -> bool {
        matches!(self, MatchDetails::RangeBreak(_))
    }

    pub fn break_percentage(&self) -> Option<f64> {
        match self {
            MatchDetails::RangeBreak(d) => Some(d.break_percentage),
            MatchDetails::Custom { .. } => None,
        }
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        match self {
            MatchDetails::RangeBreak(d) => Some(d.volume_ratio),
            MatchDetails::Custom { .. } => None,
        }
    }
}

/// Raw result of one detector on one series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Index of the matched bar in the series the detector was given
    pub index: usize,
    pub details: MatchDetails,
}

/// A detector match for one symbol on one day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub symbol: String,
    pub variant: VariantId,
    pub matched_date: NaiveDate,
    /// Position of the matched bar in the screened series
    #[serde(skip)]
    pub matched_index: usize,
    #[serde(flatten)]
    pub details: MatchDetails,
}

impl MatchRecord {
    #[inline]
    pub fn break_percentage(&self) -> Option<f64> {
        self.details.break_percentage()
    }

    #[inline]
    pub fn volume_ratio(&self) -> Option<f64> {
        self.details.volume_ratio()
    }
}

// ============================================================
// DETECTOR TRAITS
// ============================================================

/// Generic detector trait - for concrete types
pub trait SeriesDetector: Send + Sync {
    fn variant(&self) -> VariantId;

    /// Bars needed before the detector can ever match
    fn min_bars(&self) -> usize;

    /// Scan the last `recent_window_days` bars for a match
    fn detect<T: OHLCV>(&self, bars: &[T], recent_window_days: usize) -> Option<Detection>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// Object-safe detector trait - for custom detectors, which may fail
pub trait DynDetector: Send + Sync {
    fn variant(&self) -> VariantId;
    fn min_bars(&self) -> usize;
    fn detect(&self, bars: &[&dyn OHLCV], recent_window_days: usize) -> Result<Option<Detection>>;
    fn validate_config(&self) -> Result<()>;
}

impl<D: SeriesDetector> DynDetector for D {
    fn variant(&self) -> VariantId {
        SeriesDetector::variant(self)
    }

    fn min_bars(&self) -> usize {
        SeriesDetector::min_bars(self)
    }

    fn detect(&self, bars: &[&dyn OHLCV], recent_window_days: usize) -> Result<Option<Detection>> {
        Ok(SeriesDetector::detect(self, bars, recent_window_days))
    }

    fn validate_config(&self) -> Result<()> {
        SeriesDetector::validate_config(self)
    }
}

// ============================================================
// BUILTIN DETECTORS
// ============================================================

/// All builtin detectors - fast path via enum dispatch
#[derive(Debug, Clone)]
pub enum BuiltinDetector {
    RangeBreak(detectors::RangeBreakDetector),
}

impl BuiltinDetector {
    #[inline]
    pub fn detect<T: OHLCV>(&self, bars: &[T], recent_window_days: usize) -> Option<Detection> {
        match self {
            Self::RangeBreak(d) => SeriesDetector::detect(d, bars, recent_window_days),
        }
    }

    #[inline]
    pub fn variant(&self) -> VariantId {
        match self {
            Self::RangeBreak(d) => SeriesDetector::variant(d),
        }
    }

    #[inline]
    pub fn min_bars(&self) -> usize {
        match self {
            Self::RangeBreak(d) => SeriesDetector::min_bars(d),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        match self {
            Self::RangeBreak(d) => SeriesDetector::validate_config(d),
        }
    }
}

// ============================================================
// SCREENING ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many of the most recent days may be flagged as a match
    pub recent_window_days: Period,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recent_window_days: Period::new_const(params::DEFAULT_RECENT_WINDOW_DAYS),
        }
    }
}

/// One symbol to screen
#[derive(Debug)]
pub struct ScreeningInput<'a, T> {
    pub symbol: &'a SymbolDescriptor,
    /// Ascending by date; the engine does not sort
    pub series: &'a [T],
}

impl<'a, T> Clone for ScreeningInput<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for ScreeningInput<'a, T> {}

impl<'a, T> ScreeningInput<'a, T> {
    pub fn new(symbol: &'a SymbolDescriptor, series: &'a [T]) -> Self {
        Self { symbol, series }
    }
}

/// Why a symbol was not screened
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Invalid(Vec<validation::InputError>),
    /// Every available point is after the simulated date
    NoHistoryAsOf(NaiveDate),
}

/// Per-symbol result of a batch
#[derive(Debug, Clone)]
pub enum SymbolOutcome {
    Screened {
        symbol: String,
        matches: Vec<MatchRecord>,
        warnings: Vec<validation::DataWarning>,
    },
    Skipped {
        symbol: String,
        reason: SkipReason,
    },
    Failed {
        symbol: String,
        error: ScreenError,
    },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Screened { symbol, .. } | Self::Skipped { symbol, .. } | Self::Failed { symbol, .. } => {
                symbol
            }
        }
    }

    pub fn matches(&self) -> &[MatchRecord] {
        match self {
            Self::Screened { matches, .. } => matches,
            _ => &[],
        }
    }
}

/// Outcomes of a batch, in input order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SymbolOutcome>,
}

impl BatchReport {
    /// All matches of screened symbols, in input order
    pub fn matches(&self) -> Vec<MatchRecord> {
        self.outcomes.iter().flat_map(|o| o.matches().iter().cloned()).collect()
    }

    pub fn into_matches(self) -> Vec<MatchRecord> {
        self.outcomes
            .into_iter()
            .flat_map(|o| match o {
                SymbolOutcome::Screened { matches, .. } => matches,
                _ => Vec::new(),
            })
            .collect()
    }

    pub fn screened_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SymbolOutcome::Screened { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SymbolOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &ScreenError)> {
        self.outcomes.iter().filter_map(|o| match o {
            SymbolOutcome::Failed { symbol, error } => Some((symbol.as_str(), error)),
            _ => None,
        })
    }
}

/// Progress notification: before each symbol (`current` set) and once at the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress<'a> {
    pub processed: usize,
    pub total: usize,
    pub current: Option<&'a str>,
}

/// Runs every enabled detector over each symbol's series
pub struct ScreeningEngine {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynDetector>>,
    config: EngineConfig,
}

impl ScreeningEngine {
    #[inline]
    pub fn recent_window_days(&self) -> usize {
        self.config.recent_window_days.get()
    }

    /// Enabled variants, builtin first
    pub fn variants(&self) -> Vec<VariantId> {
        self.builtin
            .iter()
            .map(|d| d.variant())
            .chain(self.custom.iter().map(|d| d.variant()))
            .collect()
    }

    /// Longest history any enabled detector needs
    pub fn max_required_bars(&self) -> usize {
        self.builtin
            .iter()
            .map(|d| d.min_bars())
            .chain(self.custom.iter().map(|d| d.min_bars()))
            .max()
            .unwrap_or(0)
    }

    // ===========================================
    // Single symbol
    // ===========================================

    /// Run every enabled variant against one series and concatenate matches.
    ///
    /// Fails only when a custom detector fails or reports an index outside
    /// the series.
    pub fn screen_symbol<T: OHLCV>(&self, input: &ScreeningInput<'_, T>) -> Result<Vec<MatchRecord>> {
        let bars = input.series;
        let days = self.recent_window_days();
        let mut matches = Vec::new();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if let Some(detection) = detector.detect(bars, days) {
                matches.push(make_record(&input.symbol.code, bars, detector.variant(), detection)?);
            }
        }

        // Slow path: custom detectors (vtable)
        if !self.custom.is_empty() {
            let bar_refs: Vec<&dyn OHLCV> = bars.iter().map(|b| b as &dyn OHLCV).collect();
            for detector in &self.custom {
                if let Some(detection) = detector.detect(&bar_refs, days)? {
                    matches.push(make_record(&input.symbol.code, bars, detector.variant(), detection)?);
                }
            }
        }

        Ok(matches)
    }

    /// Validate, then screen one symbol. Never fails: errors become outcomes.
    pub fn screen_one<T: OHLCV>(&self, input: &ScreeningInput<'_, T>) -> SymbolOutcome {
        let symbol = input.symbol.code.clone();
        let report = self.validate(input);

        if !report.is_valid() {
            tracing::debug!(symbol = %symbol, errors = ?report.errors, "skipping invalid input");
            return SymbolOutcome::Skipped {
                symbol,
                reason: SkipReason::Invalid(report.errors),
            };
        }
        for warning in &report.warnings {
            tracing::debug!(symbol = %symbol, %warning, "data quality warning");
        }

        match self.screen_symbol(input) {
            Ok(matches) => SymbolOutcome::Screened {
                symbol,
                matches,
                warnings: report.warnings,
            },
            Err(error) => {
                tracing::warn!(symbol = %symbol, %error, "detection failed, excluding symbol");
                SymbolOutcome::Failed { symbol, error }
            }
        }
    }

    // ===========================================
    // Batch processing
    // ===========================================

    /// Screen symbols one after another.
    ///
    /// `on_progress` is called before each symbol and once more when done.
    /// A failing symbol is recorded as [`SymbolOutcome::Failed`] and the
    /// batch continues.
    pub fn screen_batch<T, F>(&self, inputs: &[ScreeningInput<'_, T>], mut on_progress: F) -> BatchReport
    where
        T: OHLCV,
        F: FnMut(Progress<'_>),
    {
        let total = inputs.len();
        let mut outcomes = Vec::with_capacity(total);

        for (processed, input) in inputs.iter().enumerate() {
            on_progress(Progress {
                processed,
                total,
                current: Some(&input.symbol.code),
            });
            outcomes.push(self.screen_one(input));
        }
        on_progress(Progress {
            processed: total,
            total,
            current: None,
        });

        BatchReport { outcomes }
    }

    /// Same outcomes as [`screen_batch`](Self::screen_batch), computed on the rayon pool
    pub fn screen_parallel<T>(&self, inputs: &[ScreeningInput<'_, T>]) -> BatchReport
    where
        T: OHLCV + Sync,
    {
        let outcomes = inputs.par_iter().map(|input| self.screen_one(input)).collect();
        BatchReport { outcomes }
    }

    /// Check whether a symbol can be screened; see [`validation`]
    pub fn validate<T: OHLCV>(&self, input: &ScreeningInput<'_, T>) -> validation::ValidationReport {
        validation::validate_input(input, self.max_required_bars())
    }

    // ===========================================
    // Result utilities
    // ===========================================

    /// Keep records satisfying every supplied criterion
    pub fn filter(results: &[MatchRecord], criteria: &query::FilterCriteria) -> Vec<MatchRecord> {
        query::filter(results, criteria)
    }

    /// Sorted copy; the input is never reordered
    pub fn sort(results: &[MatchRecord], spec: query::SortSpec) -> Vec<MatchRecord> {
        query::sort(results, spec)
    }

    fn validate_detectors(&self) -> Result<()> {
        let mut seen = Vec::new();
        for d in &self.builtin {
            d.validate_config()?;
            seen.push(d.variant());
        }
        for d in &self.custom {
            d.validate_config()?;
            seen.push(d.variant());
        }
        if seen.is_empty() {
            return Err(ScreenError::InvalidConfig("no detection variants enabled".into()));
        }
        seen.sort();
        if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(ScreenError::InvalidConfig(format!(
                "variant {} enabled more than once",
                pair[0]
            )));
        }
        Ok(())
    }
}

fn make_record<T: OHLCV>(
    symbol: &str,
    bars: &[T],
    variant: VariantId,
    detection: Detection,
) -> Result<MatchRecord> {
    let Some(bar) = bars.get(detection.index) else {
        return Err(ScreenError::Detector {
            reason: format!(
                "match index {} outside series of {} bars",
                detection.index,
                bars.len()
            ),
            variant,
        });
    };

    Ok(MatchRecord {
        symbol: symbol.to_string(),
        variant,
        matched_date: bar.date(),
        matched_index: detection.index,
        details: detection.details,
    })
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ScreeningEngine instances
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynDetector>>,
    recent_window_days: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            builtin: Vec::new(),
            custom: Vec::new(),
            recent_window_days: params::DEFAULT_RECENT_WINDOW_DAYS,
        }
    }

    /// Builder preloaded from a deserialized configuration
    pub fn from_configuration(config: &params::EngineConfiguration) -> Self {
        Self::new()
            .with_presets(config.enabled.iter().copied())
            .recent_window_days(config.recent_window_days)
    }

    /// Add the Fast and Slow range-break variants
    pub fn with_all_defaults(self) -> Self {
        self.with_presets([params::Preset::Fast, params::Preset::Slow])
    }

    pub fn with_preset(mut self, preset: params::Preset) -> Self {
        self.builtin.push(BuiltinDetector::RangeBreak(
            detectors::RangeBreakDetector::from_preset(preset),
        ));
        self
    }

    pub fn with_presets(self, presets: impl IntoIterator<Item = params::Preset>) -> Self {
        presets.into_iter().fold(self, Self::with_preset)
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path)
    pub fn add_custom<D: DynDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Number of most recent days eligible to be flagged
    pub fn recent_window_days(mut self, days: usize) -> Self {
        self.recent_window_days = days;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<ScreeningEngine> {
        let engine = ScreeningEngine {
            builtin: self.builtin,
            custom: self.custom,
            config: EngineConfig {
                recent_window_days: Period::new(self.recent_window_days)?,
            },
        };
        engine.validate_detectors()?;
        Ok(engine)
    }
}

// ============================================================
// TESTS
// ============================================================
