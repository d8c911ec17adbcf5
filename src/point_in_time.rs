//! Point-in-time screening
//!
//! Runs the screening engine over a market universe, optionally as of a past
//! date. In that historical mode every series is cut at the simulated date
//! before detection; the full series is consulted only afterwards, to report
//! forward returns of the matches that were already found.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    detectors::percent_change,
    params::{Preset, DEFAULT_RECENT_WINDOW_DAYS},
    query::{self, FilterCriteria, SortSpec},
    source::{MarketDataConnector, MarketDataReader, SourceError},
    EngineBuilder, MatchRecord, PricePoint, Progress, Result, ScreeningInput, SkipReason,
    SymbolDescriptor, SymbolOutcome, VariantId,
};

/// Trading-day offsets reported in historical mode
pub const FORWARD_OFFSETS: [usize; 3] = [5, 20, 60];

// ============================================================
// OPTIONS & RESULTS
// ============================================================

/// One screening run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunOptions {
    /// Market / scale categories to load; empty loads everything
    pub markets: Vec<String>,
    pub variants: Vec<Preset>,
    pub recent_window_days: usize,
    /// Simulated "today"; enables historical mode
    pub as_of_date: Option<NaiveDate>,
    pub filters: FilterCriteria,
    pub sort: Option<SortSpec>,
    pub limit: Option<usize>,
    /// Screen on the rayon pool instead of one symbol at a time
    pub parallel: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            markets: Vec::new(),
            variants: Preset::ALL.to_vec(),
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            as_of_date: None,
            filters: FilterCriteria::default(),
            sort: None,
            limit: None,
            parallel: false,
        }
    }
}

impl RunOptions {
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of_date = Some(date);
        self
    }

    #[inline]
    pub fn is_historical(&self) -> bool {
        self.as_of_date.is_some()
    }
}

/// Price move a fixed number of trading days after a match
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardReturn {
    pub offset_days: usize,
    pub date: NaiveDate,
    pub price: f64,
    /// Relative to the close of the matched day, 2 decimals
    pub change_percent: f64,
}

/// A match as reported by a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenedMatch {
    #[serde(flatten)]
    pub record: MatchRecord,
    /// Keyed by offset; `None` past the end of the data. Historical mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_returns: Option<BTreeMap<usize, Option<ForwardReturn>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningRunResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of_date: Option<NaiveDate>,
    pub universe_size: usize,
    /// `universe_size - skipped_count`
    pub total_screened: usize,
    /// Matches after filtering, before `limit`
    pub match_count: usize,
    pub skipped_count: usize,
    /// Symbols whose detection failed; included in `total_screened`
    pub failed_count: usize,
    pub variant_counts: BTreeMap<VariantId, usize>,
    pub results: Vec<ScreenedMatch>,
}

// ============================================================
// ORCHESTRATOR
// ============================================================

struct LoadedSymbol {
    descriptor: SymbolDescriptor,
    /// Full series, ascending by date
    series: Vec<PricePoint>,
    /// Number of points on or before the simulated date
    cutoff: usize,
}

impl LoadedSymbol {
    /// Data exists, but none of it is known yet at the simulated date
    fn not_yet_listed(&self) -> bool {
        !self.series.is_empty() && self.cutoff == 0
    }
}

/// Screens a market universe, live or as of a past date.
///
/// Owns the connector and, after the first run, the reader it produced. The
/// reader is reused across runs and released by [`close`](Self::close).
pub struct PointInTimeScreener<C: MarketDataConnector> {
    connector: C,
    reader: Option<C::Reader>,
}

impl<C: MarketDataConnector> PointInTimeScreener<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            reader: None,
        }
    }

    /// Whether a reader has been acquired
    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    pub fn run(&mut self, options: &RunOptions) -> Result<ScreeningRunResult> {
        self.run_with_progress(options, |_| {})
    }

    /// Run a screen, reporting progress per symbol.
    ///
    /// Fails only on invalid options or when the market data cannot be read;
    /// per-symbol problems are counted in the result.
    pub fn run_with_progress<F>(&mut self, options: &RunOptions, mut on_progress: F) -> Result<ScreeningRunResult>
    where
        F: FnMut(Progress<'_>),
    {
        let engine = EngineBuilder::new()
            .with_presets(options.variants.iter().copied())
            .recent_window_days(options.recent_window_days)
            .build()?;

        let reader = self.reader()?;
        let universe = reader.list_symbols(&options.markets)?;
        let universe_size = universe.len();
        tracing::info!(
            universe = universe_size,
            as_of = ?options.as_of_date,
            variants = ?engine.variants(),
            "starting screening run"
        );

        let mut loaded = Vec::with_capacity(universe_size);
        for descriptor in universe {
            let mut series = reader.series(&descriptor.code)?;
            series.sort_by_key(|p| p.date);
            let cutoff = match options.as_of_date {
                Some(as_of) => series.partition_point(|p| p.date <= as_of),
                None => series.len(),
            };
            loaded.push(LoadedSymbol {
                descriptor,
                series,
                cutoff,
            });
        }

        // Detection only ever sees the prefix up to the simulated date
        let mut not_yet_listed = Vec::new();
        let mut inputs = Vec::with_capacity(loaded.len());
        for symbol in &loaded {
            match options.as_of_date {
                Some(as_of) if symbol.not_yet_listed() => {
                    tracing::debug!(symbol = %symbol.descriptor.code, %as_of, "no history as of simulated date, skipping");
                    not_yet_listed.push(SymbolOutcome::Skipped {
                        symbol: symbol.descriptor.code.clone(),
                        reason: SkipReason::NoHistoryAsOf(as_of),
                    });
                }
                _ => inputs.push(ScreeningInput::new(
                    &symbol.descriptor,
                    &symbol.series[..symbol.cutoff],
                )),
            }
        }

        // Progress counts the whole universe; symbols skipped above come first
        let skipped_early = not_yet_listed.len();
        let mut report = |p: Progress<'_>| {
            on_progress(Progress {
                processed: skipped_early + p.processed,
                total: universe_size,
                current: p.current,
            })
        };
        let mut batch = if options.parallel {
            let batch = engine.screen_parallel(&inputs);
            report(Progress {
                processed: inputs.len(),
                total: inputs.len(),
                current: None,
            });
            batch
        } else {
            engine.screen_batch(&inputs, &mut report)
        };

        batch.outcomes.append(&mut not_yet_listed);
        let skipped_count = batch.skipped_count();
        let failed_count = batch.failed_count();
        let matches = batch.into_matches();

        let filtered = query::filter(&matches, &options.filters);
        let mut ordered = match options.sort {
            Some(spec) => query::sort(&filtered, spec),
            None => filtered,
        };

        let mut variant_counts = BTreeMap::new();
        for record in &ordered {
            *variant_counts.entry(record.variant.clone()).or_insert(0) += 1;
        }
        let match_count = ordered.len();
        if let Some(limit) = options.limit {
            ordered.truncate(limit);
        }

        // Forward measurement runs strictly after detection has committed
        let full_series: HashMap<&str, &[PricePoint]> = loaded
            .iter()
            .map(|s| (s.descriptor.code.as_str(), s.series.as_slice()))
            .collect();
        let results = ordered
            .into_iter()
            .map(|record| {
                let forward = options.as_of_date.map(|_| {
                    let series = full_series.get(record.symbol.as_str()).copied().unwrap_or(&[]);
                    forward_returns(series, record.matched_index)
                });
                ScreenedMatch {
                    record,
                    forward_returns: forward,
                }
            })
            .collect();

        tracing::info!(
            screened = universe_size - skipped_count,
            matched = match_count,
            skipped = skipped_count,
            failed = failed_count,
            "screening run complete"
        );

        Ok(ScreeningRunResult {
            as_of_date: options.as_of_date,
            universe_size,
            total_screened: universe_size - skipped_count,
            match_count,
            skipped_count,
            failed_count,
            variant_counts,
            results,
        })
    }

    /// Release the reader, if one was acquired
    pub fn close(self) -> std::result::Result<(), SourceError> {
        match self.reader {
            Some(reader) => {
                tracing::debug!("releasing market data reader");
                reader.close()
            }
            None => Ok(()),
        }
    }

    fn reader(&mut self) -> Result<&C::Reader> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                tracing::debug!("acquiring market data reader");
                self.connector.connect()?
            }
        };
        Ok(self.reader.insert(reader))
    }
}

/// Close-to-close change from `series[index]` at each of [`FORWARD_OFFSETS`]
/// trading days later; `None` past the end of the series.
pub fn forward_returns(series: &[PricePoint], index: usize) -> BTreeMap<usize, Option<ForwardReturn>> {
    let base = series.get(index);
    FORWARD_OFFSETS
        .iter()
        .map(|&offset| {
            let value = base.zip(series.get(index + offset)).and_then(|(base, later)| {
                percent_change(base.close, later.close).map(|change_percent| ForwardReturn {
                    offset_days: offset,
                    date: later.date,
                    price: later.close,
                    change_percent,
                })
            });
            (offset, value)
        })
        .collect()
}
