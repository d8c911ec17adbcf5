//! Input validation
//!
//! Errors exclude a symbol before detection runs. Warnings are data-quality
//! concerns; the symbol is screened anyway.

use chrono::NaiveDate;

use crate::{OHLCVExt, ScreeningInput, OHLCV};

/// Consecutive trading dates further apart than this are reported
pub const MAX_GAP_DAYS: i64 = 7;

/// Share of points with non-positive prices above which a warning is raised
pub const NON_POSITIVE_SHARE: f64 = 0.10;

/// Defects that make a symbol unscreenable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("missing symbol code")]
    MissingSymbol,

    #[error("empty price series")]
    EmptySeries,
}

/// Data-quality concerns; the symbol is still screened
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataWarning {
    #[error("missing display name")]
    MissingDisplayName,

    #[error("series has {got} points, enabled variants need {need}")]
    ShortHistory { need: usize, got: usize },

    #[error("{count} of {total} points have non-positive prices")]
    NonPositivePrices { count: usize, total: usize },

    #[error("{count} points violate low <= open/close <= high (first at index {first_index})")]
    InconsistentOhlc { count: usize, first_index: usize },

    #[error("{days} day gap between {from} and {to}")]
    DateGap {
        from: NaiveDate,
        to: NaiveDate,
        days: i64,
    },
}

/// Result of [`validate_input`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<InputError>,
    pub warnings: Vec<DataWarning>,
}

impl ValidationReport {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a symbol before screening.
///
/// `required_bars` is the longest history any enabled variant needs.
pub fn validate_input<T: OHLCV>(input: &ScreeningInput<'_, T>, required_bars: usize) -> ValidationReport {
    let mut report = ValidationReport::default();
    let series = input.series;

    if input.symbol.code.trim().is_empty() {
        report.errors.push(InputError::MissingSymbol);
    }
    if series.is_empty() {
        report.errors.push(InputError::EmptySeries);
    }
    if input.symbol.display_name.trim().is_empty() {
        report.warnings.push(DataWarning::MissingDisplayName);
    }
    if series.is_empty() {
        return report;
    }

    if series.len() < required_bars {
        report.warnings.push(DataWarning::ShortHistory {
            need: required_bars,
            got: series.len(),
        });
    }

    let non_positive = series.iter().filter(|b| b.has_non_positive_price()).count();
    if non_positive as f64 > series.len() as f64 * NON_POSITIVE_SHARE {
        report.warnings.push(DataWarning::NonPositivePrices {
            count: non_positive,
            total: series.len(),
        });
    }

    let mut inconsistent = series
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.is_consistent())
        .map(|(i, _)| i);
    if let Some(first_index) = inconsistent.next() {
        report.warnings.push(DataWarning::InconsistentOhlc {
            count: 1 + inconsistent.count(),
            first_index,
        });
    }

    for pair in series.windows(2) {
        let (from, to) = (pair[0].date(), pair[1].date());
        let days = (to - from).num_days();
        if days > MAX_GAP_DAYS {
            report.warnings.push(DataWarning::DateGap { from, to, days });
        }
    }

    report
}
