//! Filtering and sorting of match records

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{MatchRecord, VariantId};

/// Inclusive date bounds; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

/// Every supplied criterion must hold.
///
/// `min_break_percentage` and `min_volume_ratio` only constrain breakout
/// records; records of other detector kinds pass them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    pub variants: Option<Vec<VariantId>>,
    pub date_range: Option<DateRange>,
    pub min_break_percentage: Option<f64>,
    pub min_volume_ratio: Option<f64>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &MatchRecord) -> bool {
        if let Some(ref variants) = self.variants {
            if !variants.contains(&record.variant) {
                return false;
            }
        }
        if let Some(range) = self.date_range {
            if !range.contains(record.matched_date) {
                return false;
            }
        }
        if let (Some(min), Some(value)) = (self.min_break_percentage, record.break_percentage()) {
            if value < min {
                return false;
            }
        }
        if let (Some(min), Some(value)) = (self.min_volume_ratio, record.volume_ratio()) {
            if value < min {
                return false;
            }
        }
        true
    }
}

/// Keep the records satisfying `criteria`, in their original order
pub fn filter(results: &[MatchRecord], criteria: &FilterCriteria) -> Vec<MatchRecord> {
    results.iter().filter(|r| criteria.matches(r)).cloned().collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    Date,
    Symbol,
    VolumeRatio,
    BreakPercentage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Sorted copy of `results`.
///
/// Ascending is a stable sort; descending is the exact reverse of it, so
/// equal keys come out in reverse input order. Records without a numeric
/// key (non-breakout kinds) sort before all others.
pub fn sort(results: &[MatchRecord], spec: SortSpec) -> Vec<MatchRecord> {
    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| compare(a, b, spec.field));
    if spec.order == SortOrder::Desc {
        sorted.reverse();
    }
    sorted
}

fn compare(a: &MatchRecord, b: &MatchRecord, field: SortField) -> Ordering {
    match field {
        SortField::Date => a.matched_date.cmp(&b.matched_date),
        SortField::Symbol => a.symbol.cmp(&b.symbol),
        SortField::VolumeRatio => compare_metric(a.volume_ratio(), b.volume_ratio()),
        SortField::BreakPercentage => compare_metric(a.break_percentage(), b.break_percentage()),
    }
}

fn compare_metric(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BreakoutDetails, MatchDetails};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn record(symbol: &str, variant: VariantId, d: u32, pct: f64, ratio: f64) -> MatchRecord {
        MatchRecord {
            symbol: symbol.into(),
            variant,
            matched_date: day(d),
            matched_index: 0,
            details: MatchDetails::RangeBreak(BreakoutDetails {
                break_percentage: pct,
                volume_ratio: ratio,
                short_window_avg_volume: 0.0,
                long_window_avg_volume: 0.0,
                current_high: 0.0,
                prior_period_max_high: 0.0,
            }),
        }
    }

    fn custom(symbol: &str, d: u32) -> MatchRecord {
        MatchRecord {
            symbol: symbol.into(),
            variant: VariantId::from_static("custom"),
            matched_date: day(d),
            matched_index: 0,
            details: MatchDetails::Custom { score: 0.5 },
        }
    }

    fn sample() -> Vec<MatchRecord> {
        vec![
            record("7203", VariantId::FAST, 4, 3.5, 2.1),
            record("6758", VariantId::SLOW, 1, 8.0, 1.8),
            record("9984", VariantId::FAST, 8, 1.2, 4.0),
            custom("4063", 6),
        ]
    }

    #[test]
    fn test_empty_criteria_keeps_everything() {
        let results = sample();
        assert!(FilterCriteria::default().is_empty());
        assert_eq!(filter(&results, &FilterCriteria::default()), results);
    }

    #[test]
    fn test_filter_by_variant_and_date() {
        let results = sample();
        let criteria = FilterCriteria {
            variants: Some(vec![VariantId::FAST]),
            date_range: Some(DateRange {
                from: Some(day(2)),
                to: Some(day(5)),
            }),
            ..Default::default()
        };
        let kept = filter(&results, &criteria);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "7203");
    }

    #[test]
    fn test_breakout_thresholds_pass_other_kinds() {
        let results = sample();
        let criteria = FilterCriteria {
            min_break_percentage: Some(3.0),
            ..Default::default()
        };
        let symbols: Vec<_> = filter(&results, &criteria).into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["7203", "6758", "4063"]);

        let criteria = FilterCriteria {
            min_volume_ratio: Some(2.0),
            ..Default::default()
        };
        let symbols: Vec<_> = filter(&results, &criteria).into_iter().map(|r| r.symbol).collect();
        assert_eq!(symbols, vec!["7203", "9984", "4063"]);
    }

    #[test]
    fn test_sort_fields() {
        let results = sample();
        let by = |field, order| -> Vec<String> {
            sort(&results, SortSpec::new(field, order))
                .into_iter()
                .map(|r| r.symbol)
                .collect()
        };

        assert_eq!(by(SortField::Date, SortOrder::Asc), ["6758", "7203", "4063", "9984"]);
        assert_eq!(by(SortField::Symbol, SortOrder::Asc), ["4063", "6758", "7203", "9984"]);
        assert_eq!(by(SortField::BreakPercentage, SortOrder::Desc), ["6758", "7203", "9984", "4063"]);
        assert_eq!(by(SortField::VolumeRatio, SortOrder::Asc), ["4063", "6758", "7203", "9984"]);
    }

    #[test]
    fn test_sort_does_not_mutate_input() {
        let results = sample();
        let before = results.clone();
        let _ = sort(&results, SortSpec::new(SortField::Symbol, SortOrder::Asc));
        assert_eq!(results, before);
    }

    #[test]
    fn test_desc_is_reverse_of_asc_with_ties() {
        let results = vec![
            record("B", VariantId::FAST, 2, 1.0, 1.0),
            record("A", VariantId::SLOW, 2, 1.0, 1.0),
            record("C", VariantId::FAST, 1, 1.0, 1.0),
        ];
        let mut asc = sort(&results, SortSpec::new(SortField::Date, SortOrder::Asc));
        let desc = sort(&results, SortSpec::new(SortField::Date, SortOrder::Desc));
        assert_eq!(asc[1].symbol, "B");
        asc.reverse();
        assert_eq!(asc, desc);
    }

    #[test]
    fn test_criteria_from_json() {
        let criteria: FilterCriteria = serde_json::from_str(
            r#"{"variants": ["range_break_slow"], "minBreakPercentage": 2.5,
                "dateRange": {"from": "2024-03-01"}}"#,
        )
        .unwrap();
        assert_eq!(criteria.variants, Some(vec![VariantId::SLOW]));
        assert_eq!(criteria.min_break_percentage, Some(2.5));
        assert_eq!(criteria.date_range.unwrap().to, None);
    }
}
