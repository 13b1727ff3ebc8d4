//! Cross-period rollups.
//!
//! All-time views collapse each name's per-period records into one row: numeric
//! fields become means and categorical fields become modes.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{
    fraction_percent, round2, usage_percent, AggregatedProfile, LabelCount, MoveShare,
    UsageRecord, UsageSummary, MOVE_SLOTS,
};

/// Roll records up into one profile per name.
///
/// - usage: mean of the percent-scaled usage over the periods that report it
/// - companion fractions: mean over every period for the name, missing values count as 0
/// - categorical fields: most frequent non-null value, ties to the smallest
///
/// Output is ordered by usage descending (missing last), then name.
pub fn aggregate(records: &[UsageRecord]) -> Vec<AggregatedProfile> {
    let mut groups: BTreeMap<&str, Vec<&UsageRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.name.as_str()).or_default().push(record);
    }

    let mut profiles: Vec<AggregatedProfile> = groups
        .into_iter()
        .map(|(name, rows)| aggregate_group(name, &rows))
        .collect();

    profiles.sort_by(|a, b| {
        compare_usage_desc(a.summary.usage_pct, b.summary.usage_pct)
            .then_with(|| a.summary.name.cmp(&b.summary.name))
    });
    profiles
}

/// Descending with missing values last.
pub(crate) fn compare_usage_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn aggregate_group(name: &str, rows: &[&UsageRecord]) -> AggregatedProfile {
    let usage: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.usage_fraction.map(usage_percent))
        .collect();
    let usage_pct = mean(&usage).map(round2);

    let item_pct = mean_null_as_zero(rows.iter().map(|r| r.item_fraction));
    let tera_pct = mean_null_as_zero(rows.iter().map(|r| r.tera_fraction));

    let moves = (0..MOVE_SLOTS)
        .map(|slot| MoveShare {
            name: mode(rows.iter().map(|r| r.moves[slot].name.as_deref())),
            pct: mean_null_as_zero(rows.iter().map(|r| r.moves[slot].fraction)),
        })
        .collect();

    AggregatedProfile {
        summary: UsageSummary {
            name: name.to_string(),
            usage_pct,
            top_item: mode(rows.iter().map(|r| r.top_item.as_deref())),
            item_pct,
            top_tera_type: mode(rows.iter().map(|r| r.top_tera_type.as_deref())),
            tera_pct,
            top_spread_without_nature: mode(rows.iter().map(|r| r.top_spread_without_nature.as_deref())),
            top_nature: mode(rows.iter().map(|r| r.top_nature.as_deref())),
            moves,
        },
        period_count: rows.len(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn mean_null_as_zero(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let percents: Vec<f64> = values.map(fraction_percent).collect();
    round2(mean(&percents).unwrap_or(0.0))
}

/// Most frequent non-null value; ties go to the lexicographically smallest.
pub fn mode<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values.flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        // BTreeMap iterates ascending, so strict > keeps the smallest on ties
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// Categorical dimension for meta distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetaDimension {
    Item,
    TeraType,
}

impl MetaDimension {
    fn label<'a>(&self, record: &'a UsageRecord) -> Option<&'a str> {
        match self {
            MetaDimension::Item => record.top_item.as_deref(),
            MetaDimension::TeraType => record.top_tera_type.as_deref(),
        }
    }
}

impl fmt::Display for MetaDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaDimension::Item => write!(f, "items"),
            MetaDimension::TeraType => write!(f, "tera-types"),
        }
    }
}

impl FromStr for MetaDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" | "items" => Ok(MetaDimension::Item),
            "tera" | "tera-type" | "tera-types" | "tera_types" => Ok(MetaDimension::TeraType),
            other => Err(format!("Unknown dimension: {} (expected items or tera-types)", other)),
        }
    }
}

/// How many records carry each value of `dimension`, most common first.
pub fn top_value_counts(
    records: &[UsageRecord],
    dimension: MetaDimension,
    k: usize,
) -> Vec<LabelCount> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for label in records.iter().filter_map(|r| dimension.label(r)) {
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut out: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect();
    // Stable over the label-ascending map order
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(k);
    out
}
