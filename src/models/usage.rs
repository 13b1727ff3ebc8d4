//! Per-period usage records and their display form.

use serde::{Deserialize, Serialize};

/// Number of move slots kept per record.
pub const MOVE_SLOTS: usize = 4;

/// One ranked move and the fraction of sets that run it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveSlot {
    pub name: Option<String>,
    pub fraction: Option<f64>,
}

impl MoveSlot {
    pub fn new(name: Option<String>, fraction: Option<f64>) -> Self {
        Self { name, fraction }
    }
}

/// One entity's statistics for one period.
///
/// `(name, period)` is the logical key of the snapshot table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Entity name as published by the source
    pub name: String,

    /// Period token, e.g. "2025-07"
    pub period: String,

    /// Usage share; older sources publish 0-1, newer ones 0-100
    pub usage_fraction: Option<f64>,

    /// Sample size
    pub raw_count: Option<f64>,

    pub top_ability: Option<String>,

    pub top_item: Option<String>,
    pub item_fraction: Option<f64>,

    pub top_tera_type: Option<String>,
    pub tera_fraction: Option<f64>,

    /// Full spread key, nature included
    pub top_spread: Option<String>,
    pub top_spread_without_nature: Option<String>,
    pub top_nature: Option<String>,

    /// Ranked by descending frequency
    pub moves: [MoveSlot; MOVE_SLOTS],
}

impl UsageRecord {
    /// Create a record with only its key set.
    pub fn new(name: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            period: period.into(),
            usage_fraction: None,
            raw_count: None,
            top_ability: None,
            top_item: None,
            item_fraction: None,
            top_tera_type: None,
            tera_fraction: None,
            top_spread: None,
            top_spread_without_nature: None,
            top_nature: None,
            moves: Default::default(),
        }
    }

    /// Case-insensitive name comparison, as used by every lookup.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Convert a stored usage value to the percent scale.
///
/// The source format changed scale over time, so anything at or below 1 is read as a
/// fraction and anything above as an already-scaled percentage.
pub fn usage_percent(raw: f64) -> f64 {
    if raw <= 1.0 {
        raw * 100.0
    } else {
        raw
    }
}

/// Convert a nullable companion fraction to a percentage, null counting as zero.
pub fn fraction_percent(fraction: Option<f64>) -> f64 {
    fraction.unwrap_or(0.0) * 100.0
}

/// Round to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A move with its percentage of sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveShare {
    pub name: Option<String>,
    pub pct: f64,
}

/// Display view of a record (or of an all-time rollup) on the percent scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub name: String,
    pub usage_pct: Option<f64>,
    pub top_item: Option<String>,
    pub item_pct: f64,
    pub top_tera_type: Option<String>,
    pub tera_pct: f64,
    /// Stat allocation without the nature prefix
    pub top_spread_without_nature: Option<String>,
    pub top_nature: Option<String>,
    pub moves: Vec<MoveShare>,
}

impl From<&UsageRecord> for UsageSummary {
    fn from(record: &UsageRecord) -> Self {
        Self {
            name: record.name.clone(),
            usage_pct: record.usage_fraction.map(|u| round2(usage_percent(u))),
            top_item: record.top_item.clone(),
            item_pct: round2(fraction_percent(record.item_fraction)),
            top_tera_type: record.top_tera_type.clone(),
            tera_pct: round2(fraction_percent(record.tera_fraction)),
            top_spread_without_nature: record.top_spread_without_nature.clone(),
            top_nature: record.top_nature.clone(),
            moves: record
                .moves
                .iter()
                .map(|m| MoveShare {
                    name: m.name.clone(),
                    pct: round2(fraction_percent(m.fraction)),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_percent_fraction_scale() {
        assert!((usage_percent(0.4512) - 45.12).abs() < 1e-9);
        assert_eq!(usage_percent(1.0), 100.0);
    }

    #[test]
    fn test_usage_percent_already_percent() {
        assert_eq!(usage_percent(45.12), 45.12);
        assert_eq!(usage_percent(1.5), 1.5);
    }

    #[test]
    fn test_fraction_percent_null_is_zero() {
        assert_eq!(fraction_percent(None), 0.0);
        assert_eq!(fraction_percent(Some(0.25)), 25.0);
    }

    #[test]
    fn test_name_matches_ignores_case() {
        let record = UsageRecord::new("Flutter Mane", "2025-01");
        assert!(record.name_matches("flutter mane"));
        assert!(!record.name_matches("flutter"));
    }

    #[test]
    fn test_summary_from_record() {
        let mut record = UsageRecord::new("Incineroar", "2025-01");
        record.usage_fraction = Some(0.48123);
        record.top_item = Some("Safety Goggles".to_string());
        record.item_fraction = Some(0.5);
        record.top_spread = Some("Careful:252/4/0/0/252/0".to_string());
        record.top_spread_without_nature = Some("252/4/0/0/252/0".to_string());
        record.moves[0] = MoveSlot::new(Some("Fake Out".to_string()), Some(0.99));

        let summary = UsageSummary::from(&record);
        assert_eq!(
            summary.top_spread_without_nature.as_deref(),
            Some("252/4/0/0/252/0")
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["top_spread_without_nature"], "252/4/0/0/252/0");
        assert!(json.get("top_spread").is_none());
        assert_eq!(summary.usage_pct, Some(48.12));
        assert_eq!(summary.item_pct, 50.0);
        assert_eq!(summary.tera_pct, 0.0);
        assert_eq!(summary.moves.len(), MOVE_SLOTS);
        assert_eq!(summary.moves[0].pct, 99.0);
        assert_eq!(summary.moves[3].name, None);
    }
}
