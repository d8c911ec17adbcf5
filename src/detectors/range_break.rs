//! Range break detector
//!
//! A day qualifies when the highest high of the recent window ending at that
//! day exceeds the highest high of the `history_window` days before the
//! recent window, and the short volume average exceeds the long one by the
//! configured threshold.
//!
//! Candidate days are scanned from the most recent backward; the most recent
//! qualifying day wins.

use std::collections::HashMap;

use super::helpers::round2;
use crate::{
    params::{
        get_flag, get_period, get_threshold, DetectionParameters, ParamMeta, ParameterizedDetector, Preset,
    },
    volume::AverageKind,
    volume::VolumeProfile,
    BreakoutDetails, Detection, MatchDetails, Period, Result, SeriesDetector, VariantId, OHLCV,
};

// ============================================================
// RANGE PRIMITIVES
// ============================================================

/// Highest high of a bar range and where it occurred
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeHigh {
    pub high: f64,
    pub index: usize,
}

/// Highest high over `bars[start..=end]`, first occurrence on ties.
///
/// `None` for an inverted or out-of-bounds range.
pub fn max_high_in_range<T: OHLCV>(bars: &[T], start: usize, end: usize) -> Option<RangeHigh> {
    if start > end || end >= bars.len() {
        return None;
    }

    let mut best = RangeHigh {
        high: bars[start].high(),
        index: start,
    };
    for (i, bar) in bars.iter().enumerate().take(end + 1).skip(start + 1) {
        if bar.high() > best.high {
            best = RangeHigh {
                high: bar.high(),
                index: i,
            };
        }
    }
    Some(best)
}

/// Outcome of comparing the recent window against the history window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BreakCheck {
    pub is_break: bool,
    /// Rounded to 2 decimals; always > 0 when `is_break`
    pub break_percentage: f64,
    pub current_high: f64,
    pub prior_max_high: f64,
}

/// Compare the recent `recent_window` days ending at `eval_index` against the
/// `history_window` days strictly before them.
///
/// Fails closed (`is_break == false`, zero percentage) when either window does
/// not fit or the prior high is not positive. A break that rounds to 0.00% is
/// not a break.
pub fn is_break_at<T: OHLCV>(
    bars: &[T],
    eval_index: usize,
    history_window: Period,
    recent_window: Period,
) -> BreakCheck {
    let (history, recent) = (history_window.get(), recent_window.get());
    if eval_index >= bars.len() || eval_index + 1 < history + recent {
        return BreakCheck::default();
    }

    let recent_start = eval_index + 1 - recent;
    let prior_start = recent_start - history;
    let (Some(current), Some(prior)) = (
        max_high_in_range(bars, recent_start, eval_index),
        max_high_in_range(bars, prior_start, recent_start - 1),
    ) else {
        return BreakCheck::default();
    };
    if !(prior.high > 0.0) {
        return BreakCheck::default();
    }

    let break_percentage = round2((current.high - prior.high) / prior.high * 100.0);
    BreakCheck {
        is_break: current.high > prior.high && break_percentage > 0.0,
        break_percentage,
        current_high: current.high,
        prior_max_high: prior.high,
    }
}

/// Scan the last `recent_window_days` bars, newest first, for a confirmed break.
///
/// Returns `None` immediately when the series is shorter than
/// `history_window + recent_window_days` of `params`.
pub fn detect_range_break<T: OHLCV>(
    bars: &[T],
    params: &DetectionParameters,
    recent_window_days: usize,
) -> Option<Detection> {
    let need = params.history_window.get() + params.recent_window_days.get();
    if bars.len() < need || recent_window_days == 0 {
        return None;
    }

    let first = bars.len().saturating_sub(recent_window_days).max(need - 1);
    let profile = VolumeProfile::new(
        bars,
        params.volume_short_window,
        params.volume_long_window,
        params.volume_average_type,
    );

    (first..bars.len()).rev().find_map(|index| {
        evaluate_at(bars, index, params, &profile).map(|details| Detection {
            index,
            details: MatchDetails::RangeBreak(details),
        })
    })
}

/// Full breakout + volume check at one bar
pub fn evaluate_at<T: OHLCV>(
    bars: &[T],
    index: usize,
    params: &DetectionParameters,
    profile: &VolumeProfile,
) -> Option<BreakoutDetails> {
    let check = is_break_at(bars, index, params.history_window, params.recent_window_days);
    if !check.is_break {
        return None;
    }

    let volume = profile.at(index)?;
    if !volume.surges(params.volume_ratio_threshold.get()) {
        return None;
    }

    Some(BreakoutDetails {
        break_percentage: check.break_percentage,
        volume_ratio: round2(volume.ratio()),
        short_window_avg_volume: volume.short_average,
        long_window_avg_volume: volume.long_average,
        current_high: check.current_high,
        prior_period_max_high: check.prior_max_high,
    })
}

// ============================================================
// DETECTOR
// ============================================================

/// Range break confirmed by a volume surge
#[derive(Debug, Clone)]
pub struct RangeBreakDetector {
    pub variant: VariantId,
    pub params: DetectionParameters,
}

impl Default for RangeBreakDetector {
    fn default() -> Self {
        Self::from_preset(Preset::Fast)
    }
}

impl RangeBreakDetector {
    pub fn new(variant: VariantId, params: DetectionParameters) -> Self {
        Self { variant, params }
    }

    pub fn from_preset(preset: Preset) -> Self {
        Self::new(preset.id(), preset.parameters())
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }
}

impl SeriesDetector for RangeBreakDetector {
    fn variant(&self) -> VariantId {
        self.variant.clone()
    }

    fn min_bars(&self) -> usize {
        self.params.min_bars()
    }

    fn detect<T: OHLCV>(&self, bars: &[T], recent_window_days: usize) -> Option<Detection> {
        detect_range_break(bars, &self.params, recent_window_days)
    }

    fn validate_config(&self) -> Result<()> {
        self.params.validate()
    }
}

const RANGE_BREAK_PARAMS: &[ParamMeta] = &[
    ParamMeta::period(
        "history_window",
        100.0,
        (20.0, 300.0, 20.0),
        "Days before the recent window whose highs form the range",
    ),
    ParamMeta::period(
        "recent_window_days",
        10.0,
        (1.0, 30.0, 1.0),
        "Days whose highs must break the range",
    ),
    ParamMeta::threshold(
        "volume_ratio_threshold",
        1.7,
        (1.0, 3.0, 0.1),
        "Required short/long volume average multiple",
    ),
    ParamMeta::period(
        "volume_short_window",
        20.0,
        (5.0, 60.0, 5.0),
        "Short volume average window",
    ),
    ParamMeta::period(
        "volume_long_window",
        100.0,
        (20.0, 250.0, 10.0),
        "Long volume average window",
    ),
    ParamMeta::flag(
        "volume_average_ema",
        true,
        "Exponential (1) or simple (0) volume averages",
    ),
];

impl ParameterizedDetector for RangeBreakDetector {
    fn param_meta() -> &'static [ParamMeta] {
        RANGE_BREAK_PARAMS
    }

    fn with_params(variant: VariantId, params: &HashMap<&str, f64>) -> Result<Self> {
        let base = Preset::Fast.parameters();
        let params = DetectionParameters {
            history_window: get_period(params, "history_window", base.history_window.get())?,
            recent_window_days: get_period(
                params,
                "recent_window_days",
                base.recent_window_days.get(),
            )?,
            volume_ratio_threshold: get_threshold(
                params,
                "volume_ratio_threshold",
                base.volume_ratio_threshold.get(),
            )?,
            volume_short_window: get_period(
                params,
                "volume_short_window",
                base.volume_short_window.get(),
            )?,
            volume_long_window: get_period(
                params,
                "volume_long_window",
                base.volume_long_window.get(),
            )?,
            volume_average_type: if get_flag(
                params,
                "volume_average_ema",
                base.volume_average_type == AverageKind::Ema,
            )? {
                AverageKind::Ema
            } else {
                AverageKind::Sma
            },
        };
        params.validate()?;
        Ok(Self::new(variant, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{volume::AverageKind, PricePoint, Threshold};
    use chrono::NaiveDate;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Days::new(i as u64)
    }

    /// 150 days inside 950..1050, then 10 rising days above 1050 with 3x volume
    fn breakout_series() -> Vec<PricePoint> {
        (0..160)
            .map(|i| {
                if i < 150 {
                    let close = 1000.0 + ((i * 37) % 81) as f64 - 40.0;
                    PricePoint::new(day(i), close, close + 10.0, close - 10.0, close, 100_000.0)
                } else {
                    let close = 1060.0 + (i - 150) as f64 * 10.0;
                    PricePoint::new(day(i), close - 5.0, close + 5.0, close - 8.0, close, 300_000.0)
                }
            })
            .collect()
    }

    fn params(threshold: f64) -> DetectionParameters {
        DetectionParameters {
            history_window: Period::new_const(100),
            recent_window_days: Period::new_const(10),
            volume_ratio_threshold: Threshold::new(threshold).unwrap(),
            volume_short_window: Period::new_const(5),
            volume_long_window: Period::new_const(50),
            volume_average_type: AverageKind::Sma,
        }
    }

    #[test]
    fn test_max_high_in_range() {
        let bars = breakout_series();
        assert!(max_high_in_range(&bars, 5, 4).is_none());
        assert!(max_high_in_range(&bars, 0, 160).is_none());
        assert!(max_high_in_range::<PricePoint>(&[], 0, 0).is_none());

        let top = max_high_in_range(&bars, 150, 159).unwrap();
        assert_eq!(top.index, 159);
        assert_eq!(top.high, 1155.0);

        let single = max_high_in_range(&bars, 3, 3).unwrap();
        assert_eq!(single.index, 3);
    }

    #[test]
    fn test_max_high_ties_keep_first() {
        let bars: Vec<PricePoint> = (0..4)
            .map(|i| PricePoint::new(day(i), 10.0, 12.0, 9.0, 11.0, 1.0))
            .collect();
        assert_eq!(max_high_in_range(&bars, 0, 3).unwrap().index, 0);
    }

    #[test]
    fn test_is_break_at() {
        let bars = breakout_series();
        let check = is_break_at(&bars, 159, Period::new_const(100), Period::new_const(10));
        assert!(check.is_break);
        assert!(check.break_percentage > 0.0);
        assert_eq!(check.current_high, 1155.0);
        assert!(check.prior_max_high <= 1050.0);

        // last in-range day: no break
        let check = is_break_at(&bars, 149, Period::new_const(100), Period::new_const(10));
        assert!(!check.is_break);
    }

    #[test]
    fn test_is_break_at_insufficient_history() {
        let bars = breakout_series();
        let check = is_break_at(&bars, 108, Period::new_const(100), Period::new_const(10));
        assert_eq!(check, BreakCheck::default());
        let check = is_break_at(&bars, 160, Period::new_const(100), Period::new_const(10));
        assert_eq!(check, BreakCheck::default());
        // first index where both windows fit
        let check = is_break_at(&bars, 109, Period::new_const(100), Period::new_const(10));
        assert!(check.prior_max_high > 0.0);
    }

    #[test]
    fn test_detect_finds_breakout() {
        let bars = breakout_series();
        let detection = detect_range_break(&bars, &params(1.7), 10).unwrap();

        assert_eq!(detection.index, 159);
        let MatchDetails::RangeBreak(details) = detection.details else {
            panic!("expected range break details");
        };
        assert!(details.break_percentage > 0.0);
        assert_eq!(details.short_window_avg_volume, 300_000.0);
        assert_eq!(details.long_window_avg_volume, 140_000.0);
        assert_eq!(details.volume_ratio, 2.14);
    }

    #[test]
    fn test_unreachable_threshold() {
        let bars = breakout_series();
        assert!(detect_range_break(&bars, &params(100.0), 10).is_none());
    }

    #[test]
    fn test_most_recent_qualifying_day_wins() {
        let mut bars = breakout_series();
        // surge only on days 150..155, silence afterwards
        for bar in &mut bars[155..] {
            bar.volume = 0.0;
        }

        let detection = detect_range_break(&bars, &params(1.7), 10).unwrap();
        assert_eq!(detection.index, 155);

        // earlier days qualify too, but are not reported
        let profile = VolumeProfile::new(&bars, Period::new_const(5), Period::new_const(50), AverageKind::Sma);
        assert!(evaluate_at(&bars, 154, &params(1.7), &profile).is_some());
        assert!(evaluate_at(&bars, 156, &params(1.7), &profile).is_none());

        // eligible window that excludes day 155
        assert!(detect_range_break(&bars, &params(1.7), 4).is_none());
        assert_eq!(detect_range_break(&bars, &params(1.7), 5).unwrap().index, 155);
    }

    #[test]
    fn test_insufficient_history() {
        let bars = breakout_series();
        assert!(detect_range_break(&bars[..109], &params(1.7), 10).is_none());
        assert!(detect_range_break(&bars, &params(1.7), 0).is_none());
    }

    #[test]
    fn test_constant_prices_never_break() {
        let bars: Vec<PricePoint> = (0..200)
            .map(|i| {
                let volume = if i >= 190 { 900_000.0 } else { 100_000.0 };
                PricePoint::new(day(i), 500.0, 500.0, 500.0, 500.0, volume)
            })
            .collect();
        assert!(detect_range_break(&bars, &params(1.1), 10).is_none());
    }

    #[test]
    fn test_param_meta_defaults_match_fast_preset() {
        let fast = Preset::Fast.parameters();
        let meta = RangeBreakDetector::param_meta();
        assert_eq!(meta.len(), 6);
        assert_eq!(meta[5].default, 1.0);
        assert_eq!(meta[0].default, fast.history_window.get() as f64);
        assert_eq!(meta[2].default, fast.volume_ratio_threshold.get());
        for m in meta {
            assert!(m.validate(m.default).is_ok(), "{}", m.name);
        }
    }

    #[test]
    fn test_with_params() {
        let mut map = HashMap::new();
        map.insert("history_window", 60.0);
        map.insert("volume_ratio_threshold", 2.0);
        let detector = RangeBreakDetector::with_params(VariantId::from_static("grid_60"), &map).unwrap();

        assert_eq!(detector.params.history_window.get(), 60);
        assert_eq!(detector.params.volume_ratio_threshold.get(), 2.0);
        assert_eq!(detector.params.volume_long_window.get(), 100);
        assert_eq!(detector.params.volume_average_type, AverageKind::Ema);

        map.insert("volume_average_ema", 0.0);
        let detector = RangeBreakDetector::with_params(VariantId::from_static("grid_sma"), &map).unwrap();
        assert_eq!(detector.params.volume_average_type, AverageKind::Sma);

        map.insert("volume_average_ema", 0.5);
        assert!(RangeBreakDetector::with_params(VariantId::FAST, &map).is_err());
        map.remove("volume_average_ema");

        map.insert("volume_short_window", 150.0);
        assert!(RangeBreakDetector::with_params(VariantId::FAST, &map).is_err());
    }
}
