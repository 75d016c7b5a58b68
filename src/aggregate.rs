use std::collections::BTreeMap;

use crate::normalize::round3;

/// One normalized query result, with its source and query-type weights
/// already resolved from config.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub source_weight: f64,
    pub query_weight: f64,
    pub weights: BTreeMap<String, f64>,
}

/// Merge normalized weight maps from every (source, query-type) pair into
/// one unified score map.
///
/// Each tag accumulates `weight * source_weight * query_weight`. Rounding
/// to 3 decimals happens once after full summation, so the result is
/// independent of contribution order. Empty maps (failed, unsupported, or
/// filtered-to-nothing queries) contribute nothing.
pub fn aggregate(contributions: &[Contribution]) -> BTreeMap<String, f64> {
    let mut unified: BTreeMap<String, f64> = BTreeMap::new();

    for contrib in contributions {
        let factor = contrib.source_weight * contrib.query_weight;
        for (tag, weight) in &contrib.weights {
            *unified.entry(tag.clone()).or_insert(0.0) += weight * factor;
        }
    }

    for score in unified.values_mut() {
        *score = round3(*score);
    }
    unified
}
