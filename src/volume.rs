//! Volume statistics
//!
//! Windowed moving averages over a volume series and the short-vs-long
//! "volume surge" comparison that confirms a breakout.
//!
//! Every average at index `i` is computed from bars `0..=i` only, so values
//! never depend on later bars.

use serde::{Deserialize, Serialize};

use crate::{Period, OHLCV};

/// Smoothing used for a volume average
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AverageKind {
    #[default]
    Sma,
    /// Smoothing factor `2 / (window + 1)`, seeded with the SMA of the first window
    Ema,
}

/// Dense moving average of `values`.
///
/// Output has `values.len() - window + 1` entries; element `k` covers
/// `values[k..k + window]`. Empty when there are fewer values than `window`.
///
/// SMA windows are summed independently, so a window of zeros averages to
/// exactly 0 whatever came before it.
pub fn moving_average(values: &[f64], window: Period, kind: AverageKind) -> Vec<f64> {
    let window = window.get();
    if values.len() < window {
        return Vec::new();
    }

    let mean = |w: &[f64]| w.iter().sum::<f64>() / window as f64;
    match kind {
        AverageKind::Sma => values.windows(window).map(mean).collect(),
        AverageKind::Ema => {
            let alpha = 2.0 / (window as f64 + 1.0);
            let mut out = Vec::with_capacity(values.len() - window + 1);
            let mut prev = mean(&values[..window]);
            out.push(prev);
            for &v in &values[window..] {
                prev = alpha * v + (1.0 - alpha) * prev;
                out.push(prev);
            }
            out
        }
    }
}

/// Volume average at one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeAnalysis {
    pub window: usize,
    pub average: f64,
    /// Volume of the bar itself
    pub current: f64,
    /// `current / average`, or 0 when the average is not positive
    pub ratio: f64,
}

/// Average volume over `window` bars ending at `end_index`.
///
/// `None` when the series is empty, shorter than `window`, `end_index` is out
/// of bounds or fewer than `window` bars end at `end_index`.
pub fn analyze<T: OHLCV>(
    bars: &[T],
    window: Period,
    end_index: usize,
    kind: AverageKind,
) -> Option<VolumeAnalysis> {
    if bars.is_empty() || bars.len() < window.get() || end_index >= bars.len() {
        return None;
    }

    let volumes: Vec<f64> = bars[..=end_index].iter().map(|b| b.volume()).collect();
    let average = *moving_average(&volumes, window, kind).last()?;
    let current = bars[end_index].volume();

    Some(VolumeAnalysis {
        window: window.get(),
        average,
        current,
        ratio: ratio(current, average),
    })
}

/// `true` iff both averages exist and `short > long * threshold`.
///
/// An all-zero series never surges: both averages are 0 and `0 > 0` fails
/// for every threshold.
pub fn surge_condition<T: OHLCV>(
    bars: &[T],
    short_window: Period,
    long_window: Period,
    threshold: f64,
    end_index: usize,
    kind: AverageKind,
) -> bool {
    let (Some(short), Some(long)) = (
        analyze(bars, short_window, end_index, kind),
        analyze(bars, long_window, end_index, kind),
    ) else {
        return false;
    };
    short.average > long.average * threshold
}

#[inline]
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ============================================================
// PRECOMPUTED PROFILE
// ============================================================

/// Short and long volume averages for every bar of one series.
///
/// Computed once per series so a detector can test many candidate days
/// without recomputing the averages. Values agree with [`analyze`].
#[derive(Debug, Clone)]
pub struct VolumeProfile {
    short_window: usize,
    long_window: usize,
    short: Vec<f64>,
    long: Vec<f64>,
}

/// Both averages at one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurgeReading {
    pub short_average: f64,
    pub long_average: f64,
}

impl SurgeReading {
    /// Short average over long average, 0 when the long average is not positive
    #[inline]
    pub fn ratio(&self) -> f64 {
        ratio(self.short_average, self.long_average)
    }

    #[inline]
    pub fn surges(&self, threshold: f64) -> bool {
        self.short_average > self.long_average * threshold
    }
}

impl VolumeProfile {
    pub fn new<T: OHLCV>(bars: &[T], short_window: Period, long_window: Period, kind: AverageKind) -> Self {
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume()).collect();
        Self {
            short_window: short_window.get(),
            long_window: long_window.get(),
            short: moving_average(&volumes, short_window, kind),
            long: moving_average(&volumes, long_window, kind),
        }
    }

    /// Averages of the windows ending at `index`, if both windows fit
    pub fn at(&self, index: usize) -> Option<SurgeReading> {
        let short = index
            .checked_sub(self.short_window - 1)
            .and_then(|k| self.short.get(k))?;
        let long = index
            .checked_sub(self.long_window - 1)
            .and_then(|k| self.long.get(k))?;
        Some(SurgeReading {
            short_average: *short,
            long_average: *long,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PricePoint;
    use chrono::NaiveDate;

    fn bars_with_volume(volumes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                PricePoint::new(start + chrono::Days::new(i as u64), 10.0, 11.0, 9.0, 10.0, v)
            })
            .collect()
    }

    fn p(n: usize) -> Period {
        Period::new(n).unwrap()
    }

    #[test]
    fn test_sma() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], p(3), AverageKind::Sma);
        assert_eq!(ma, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_ema_seeded_by_sma() {
        let ma = moving_average(&[2.0, 4.0, 6.0, 8.0], p(3), AverageKind::Ema);
        assert_eq!(ma.len(), 2);
        assert!((ma[0] - 4.0).abs() < 1e-12);
        // alpha = 0.5
        assert!((ma[1] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_input_is_empty() {
        assert!(moving_average(&[1.0, 2.0], p(3), AverageKind::Sma).is_empty());
        assert!(moving_average(&[], p(1), AverageKind::Ema).is_empty());
        assert_eq!(moving_average(&[7.0], p(1), AverageKind::Ema), vec![7.0]);
    }

    #[test]
    fn test_analyze_bounds() {
        let bars = bars_with_volume(&[100.0, 200.0, 300.0, 400.0]);
        assert!(analyze(&bars, p(2), 4, AverageKind::Sma).is_none());
        assert!(analyze(&bars, p(5), 3, AverageKind::Sma).is_none());
        assert!(analyze(&bars, p(3), 1, AverageKind::Sma).is_none());
        assert!(analyze::<PricePoint>(&[], p(1), 0, AverageKind::Sma).is_none());

        let a = analyze(&bars, p(2), 3, AverageKind::Sma).unwrap();
        assert_eq!(a.window, 2);
        assert_eq!(a.average, 350.0);
        assert_eq!(a.current, 400.0);
        assert!((a.ratio - 400.0 / 350.0).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_zero_average_ratio() {
        let bars = bars_with_volume(&[0.0, 0.0, 0.0]);
        let a = analyze(&bars, p(2), 2, AverageKind::Ema).unwrap();
        assert_eq!(a.average, 0.0);
        assert_eq!(a.ratio, 0.0);
    }

    #[test]
    fn test_surge_condition() {
        let mut volumes = vec![100.0; 20];
        volumes.extend([400.0; 5]);
        let bars = bars_with_volume(&volumes);
        let last = bars.len() - 1;

        assert!(surge_condition(&bars, p(5), p(20), 1.7, last, AverageKind::Sma));
        assert!(!surge_condition(&bars, p(5), p(20), 100.0, last, AverageKind::Sma));
        // long window does not fit yet
        assert!(!surge_condition(&bars, p(5), p(20), 1.7, 10, AverageKind::Sma));
    }

    #[test]
    fn test_zero_volume_never_surges() {
        let bars = bars_with_volume(&[0.0; 30]);
        for threshold in [1e-9, 0.5, 1.0, 1.7] {
            assert!(!surge_condition(&bars, p(5), p(20), threshold, 29, AverageKind::Sma));
            assert!(!surge_condition(&bars, p(5), p(20), threshold, 29, AverageKind::Ema));
        }
    }

    #[test]
    fn test_zero_tail_after_busy_history() {
        let mut volumes: Vec<f64> = (0..80)
            .map(|i| ((i * 7_919) % 4_999_999) as f64 + 0.37 * i as f64)
            .collect();
        volumes.extend([0.0; 25]);
        let bars = bars_with_volume(&volumes);
        let last = bars.len() - 1;

        let short = analyze(&bars, p(5), last, AverageKind::Sma).unwrap();
        let long = analyze(&bars, p(20), last, AverageKind::Sma).unwrap();
        assert_eq!(short.average, 0.0);
        assert_eq!(long.average, 0.0);

        let profile = VolumeProfile::new(&bars, p(5), p(20), AverageKind::Sma);
        let reading = profile.at(last).unwrap();
        assert_eq!(reading.short_average, 0.0);
        assert_eq!(reading.long_average, 0.0);
        assert!(!reading.surges(1.7));

        for threshold in [1e-9, 1.0, 1.7] {
            assert!(!surge_condition(&bars, p(5), p(20), threshold, last, AverageKind::Sma));
        }
    }

    #[test]
    fn test_profile_matches_analyze() {
        let volumes: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 37) % 11) as f64 * 25.0).collect();
        let bars = bars_with_volume(&volumes);

        for kind in [AverageKind::Sma, AverageKind::Ema] {
            let profile = VolumeProfile::new(&bars, p(5), p(20), kind);
            assert!(profile.at(18).is_none());
            for i in 19..bars.len() {
                let reading = profile.at(i).unwrap();
                let short = analyze(&bars, p(5), i, kind).unwrap();
                let long = analyze(&bars, p(20), i, kind).unwrap();
                assert!((reading.short_average - short.average).abs() < 1e-6);
                assert!((reading.long_average - long.average).abs() < 1e-6);
            }
            assert!(profile.at(bars.len()).is_none());
        }
    }
}
