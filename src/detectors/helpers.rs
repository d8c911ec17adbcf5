//! Numeric helpers shared by detectors and forward-return reporting

/// Round to 2 decimals, the precision of every reported percentage and ratio
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `(to - from) / from * 100`, rounded to 2 decimals. `None` when `from` is not positive.
#[inline]
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
    (from > 0.0).then(|| round2((to - from) / from * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.235_1), 1.24);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(100.0, 105.0), Some(5.0));
        assert_eq!(percent_change(1000.0, 990.0), Some(-1.0));
        assert_eq!(percent_change(0.0, 10.0), None);
        assert_eq!(percent_change(-5.0, 10.0), None);
    }
}
