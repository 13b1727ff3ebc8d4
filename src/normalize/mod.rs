//! Snapshot normalization.
//!
//! Turns one raw usage document (nested category -> count maps per entity) into flat
//! per-period [`UsageRecord`]s:
//! - Single-choice dimensions (abilities, items, spreads, tera types) become shares
//!   of their own total
//! - Moves become the share of sets that run the move
//! - Top values are picked with deterministic tie-breaks
//!
//! Nothing in here fails: malformed input degrades to empty distributions and null
//! top values.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{MoveSlot, UsageRecord, MOVE_SLOTS};

/// Category -> fraction, ordered by category.
pub type Distribution = BTreeMap<String, f64>;

/// Moves per set assumed by the move-share estimate.
const MOVES_PER_SET: f64 = 4.0;

/// Separator between nature and stat allocation in a spread key.
const SPREAD_SEPARATOR: char = ':';

const USAGE_KEYS: &[&str] = &["usage", "Usage"];
const RAW_COUNT_KEYS: &[&str] = &["Raw count", "raw_count"];
const ABILITIES_KEY: &str = "Abilities";
const ITEMS_KEY: &str = "Items";
const SPREADS_KEY: &str = "Spreads";
const TERA_KEY: &str = "Tera Types";
const MOVES_KEY: &str = "Moves";

/// Numeric entries of a count map with their total, or `None` if there is nothing usable.
fn counts_with_total(counts: Option<&Value>) -> Option<(Vec<(&String, f64)>, f64)> {
    let Some(Value::Object(map)) = counts else {
        return None;
    };

    let entries: Vec<(&String, f64)> = map
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|c| (k, c)))
        .collect();
    let total: f64 = entries.iter().map(|(_, c)| c).sum();

    if total <= 0.0 {
        None
    } else {
        Some((entries, total))
    }
}

/// Divide each count by the total.
///
/// Absent input, a non-object, or a non-positive total yields an empty distribution.
/// Non-numeric values are ignored.
pub fn normalize_distribution(counts: Option<&Value>) -> Distribution {
    match counts_with_total(counts) {
        Some((entries, total)) => entries
            .into_iter()
            .map(|(k, c)| (k.clone(), c / total))
            .collect(),
        None => Distribution::new(),
    }
}

/// Share of sets running each move.
///
/// Move counts are occurrences across up to four slots per set, so the set count is
/// estimated as `total / 4`. The result is not clamped: inconsistent counts can push
/// a share above 1.
pub fn normalize_move_distribution(counts: Option<&Value>) -> Distribution {
    match counts_with_total(counts) {
        Some((entries, total)) => {
            let set_count = total / MOVES_PER_SET;
            entries
                .into_iter()
                .map(|(k, c)| (k.clone(), c / set_count))
                .collect()
        }
        None => Distribution::new(),
    }
}

/// Entries by fraction descending, key ascending on ties.
fn ranked(distribution: &Distribution) -> Vec<(&String, f64)> {
    let mut entries: Vec<(&String, f64)> = distribution.iter().map(|(k, v)| (k, *v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    entries
}

/// The highest-fraction entry; the smallest key wins a tie.
pub fn top_with_fraction(distribution: &Distribution) -> Option<(String, f64)> {
    ranked(distribution)
        .into_iter()
        .next()
        .map(|(k, v)| (k.clone(), v))
}

/// The `n` highest entries, padded with `(None, None)` to exactly `n`.
pub fn top_n_with_fraction(
    distribution: &Distribution,
    n: usize,
) -> Vec<(Option<String>, Option<f64>)> {
    let mut top: Vec<(Option<String>, Option<f64>)> = ranked(distribution)
        .into_iter()
        .take(n)
        .map(|(k, v)| (Some(k.clone()), Some(v)))
        .collect();
    top.resize(n, (None, None));
    top
}

/// Split a spread key into `(nature, allocation)` at the first separator.
///
/// Keys without a separator have no nature and are returned unchanged.
pub fn parse_spread(spread_key: &str) -> (Option<String>, String) {
    match spread_key.split_once(SPREAD_SEPARATOR) {
        Some((nature, rest)) => (Some(nature.to_string()), rest.to_string()),
        None => (None, spread_key.to_string()),
    }
}

/// First numeric value found under any of `keys`.
fn first_number(info: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| info.get(*k).and_then(Value::as_f64))
}

/// Normalize one entity's stats into a record for `period`.
pub fn normalize_entity(name: &str, info: &Value, period: &str) -> UsageRecord {
    let abilities = normalize_distribution(info.get(ABILITIES_KEY));
    let items = normalize_distribution(info.get(ITEMS_KEY));
    let spreads = normalize_distribution(info.get(SPREADS_KEY));
    let tera_types = normalize_distribution(info.get(TERA_KEY));
    let moves = normalize_move_distribution(info.get(MOVES_KEY));

    let mut record = UsageRecord::new(name, period);
    record.usage_fraction = first_number(info, USAGE_KEYS);
    record.raw_count = first_number(info, RAW_COUNT_KEYS);
    record.top_ability = top_with_fraction(&abilities).map(|(k, _)| k);

    if let Some((item, fraction)) = top_with_fraction(&items) {
        record.top_item = Some(item);
        record.item_fraction = Some(fraction);
    }

    if let Some((tera, fraction)) = top_with_fraction(&tera_types) {
        record.top_tera_type = Some(tera);
        record.tera_fraction = Some(fraction);
    }

    if let Some((spread, _)) = top_with_fraction(&spreads) {
        let (nature, allocation) = parse_spread(&spread);
        record.top_nature = nature;
        record.top_spread_without_nature = Some(allocation);
        record.top_spread = Some(spread);
    }

    for (slot, (name, fraction)) in record
        .moves
        .iter_mut()
        .zip(top_n_with_fraction(&moves, MOVE_SLOTS))
    {
        *slot = MoveSlot::new(name, fraction);
    }

    record
}

/// Normalize a whole snapshot document.
///
/// The entity map may be the document itself or sit under a `data` key. Records come
/// out in entity-name order.
pub fn normalize_document(document: &Value, period: &str) -> Vec<UsageRecord> {
    let container = document.get("data").unwrap_or(document);

    let mut records: Vec<UsageRecord> = match container {
        Value::Object(entities) => entities
            .iter()
            .map(|(name, info)| normalize_entity(name, info, period))
            .collect(),
        _ => Vec::new(),
    };
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
}
