use std::collections::BTreeMap;

use crate::providers::RawTagResponse;

/// Minimum relative weight a tag needs to survive normalization.
pub const DEFAULT_FLOOR: f64 = 0.1;

/// Round to 3 decimals, the precision used throughout scoring.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Normalize a raw tag-count response into canonicalized weights in [0, 1].
///
/// Only a response of exactly one block with a present tag map is usable;
/// zero blocks, multiple blocks, or a missing tag field all yield an empty
/// map. Counts are scaled so the most popular tag lands at 1.0, rounded to
/// 3 decimals, and entries below `floor` are dropped. When every count is
/// zero (Discogs-style categorical sets carry no popularity signal) the
/// tags fall back to rank weights 1/(i+1) in their original order, so the
/// first-listed tag always survives at 1.0.
pub fn normalize(raw: &RawTagResponse, floor: f64) -> BTreeMap<String, f64> {
    if raw.len() != 1 {
        return BTreeMap::new();
    }
    let counts = match &raw[0].tags {
        Some(tags) if !tags.is_empty() => tags,
        _ => return BTreeMap::new(),
    };

    let max = counts.iter().map(|(_, c)| *c).fold(0.0_f64, f64::max);

    let scaled: Vec<(&str, f64)> = if max > 0.0 {
        scale(counts.iter().map(|(t, c)| (t.as_str(), *c)), max, floor)
    } else {
        // All-zero counts: rank-based fallback preserving insertion order.
        let ranked: Vec<(&str, f64)> = counts
            .iter()
            .enumerate()
            .map(|(i, (t, _))| (t.as_str(), 1.0 / (i as f64 + 1.0)))
            .collect();
        let max = ranked.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);
        scale(ranked.into_iter(), max, floor)
    };

    // Canonicalize keys last; colliding keys sum their weights.
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for (tag, weight) in scaled {
        *out.entry(canonicalize(tag)).or_insert(0.0) += weight;
    }
    out
}

/// Scale counts against `max`, round to 3 decimals, drop entries below the floor.
fn scale<'a>(
    counts: impl Iterator<Item = (&'a str, f64)>,
    max: f64,
    floor: f64,
) -> Vec<(&'a str, f64)> {
    counts
        .map(|(tag, count)| (tag, round3(count / max)))
        .filter(|(_, weight)| *weight >= floor)
        .collect()
}

/// Canonicalize a tag to its display casing.
///
/// Words shorter than 3 characters are treated as acronyms and upper-cased;
/// longer words are title-cased. "deep house" becomes "Deep House" and
/// "nu disco" becomes "NU Disco".
pub fn canonicalize(tag: &str) -> String {
    tag.split(' ')
        .map(|word| {
            if word.chars().count() < 3 {
                word.to_uppercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TagBlock;
    use proptest::prelude::*;

    fn response(tags: Vec<(&str, f64)>) -> RawTagResponse {
        vec![TagBlock {
            tags: Some(tags.into_iter().map(|(t, c)| (t.to_string(), c)).collect()),
        }]
    }

    #[test]
    fn test_canonicalize_casing() {
        assert_eq!(canonicalize("deep house"), "Deep House");
        assert_eq!(canonicalize("nu disco"), "NU Disco");
        assert_eq!(canonicalize("rnb"), "Rnb");
        assert_eq!(canonicalize("HARD ROCK"), "Hard Rock");
        assert_eq!(canonicalize("uk garage"), "UK Garage");
    }

    #[test]
    fn test_normalize_scales_to_max() {
        let weights = normalize(&response(vec![("rock", 10.0), ("hard rock", 4.0)]), 0.1);
        assert_eq!(weights.get("Rock"), Some(&1.0));
        assert_eq!(weights.get("Hard Rock"), Some(&0.4));
    }

    #[test]
    fn test_normalize_drops_below_floor() {
        let weights = normalize(
            &response(vec![("rock", 100.0), ("noise", 5.0), ("pop", 20.0)]),
            0.1,
        );
        assert_eq!(weights.len(), 2);
        assert!(weights.contains_key("Rock"));
        assert!(weights.contains_key("Pop"));
        assert!(!weights.contains_key("Noise"));
    }

    #[test]
    fn test_normalize_zero_counts_fallback() {
        // All-zero counts: A, B, C in insertion order get 1, 1/2, 1/3.
        let weights = normalize(
            &response(vec![("ambient", 0.0), ("idm", 0.0), ("downtempo", 0.0)]),
            0.1,
        );
        assert_eq!(weights.get("Ambient"), Some(&1.0));
        assert_eq!(weights.get("Idm"), Some(&0.5));
        assert_eq!(weights.get("Downtempo"), Some(&0.333));
        let a = weights["Ambient"];
        let b = weights["Idm"];
        let c = weights["Downtempo"];
        assert!(a > b && b > c);
    }

    #[test]
    fn test_normalize_rejects_bad_shapes() {
        // Zero blocks
        assert!(normalize(&vec![], 0.1).is_empty());
        // Multiple blocks
        let many = vec![
            TagBlock {
                tags: Some(vec![("rock".to_string(), 1.0)]),
            },
            TagBlock {
                tags: Some(vec![("pop".to_string(), 1.0)]),
            },
        ];
        assert!(normalize(&many, 0.1).is_empty());
        // Missing tag field
        assert!(normalize(&vec![TagBlock { tags: None }], 0.1).is_empty());
        // Present but empty tag map
        assert!(normalize(&vec![TagBlock { tags: Some(vec![]) }], 0.1).is_empty());
    }

    #[test]
    fn test_normalize_collision_sums() {
        // "nu metal" and "NU METAL" canonicalize to the same key.
        let weights = normalize(
            &response(vec![("nu metal", 10.0), ("NU METAL", 10.0)]),
            0.1,
        );
        assert_eq!(weights.get("NU Metal"), Some(&2.0));
    }

    proptest! {
        #[test]
        fn prop_weights_bounded_and_argmax_is_one(
            counts in proptest::collection::vec(("[a-z]{1,8}", 1u32..10_000), 1..20)
        ) {
            let tags: Vec<(String, f64)> = counts
                .iter()
                .map(|(t, c)| (t.clone(), *c as f64))
                .collect();
            let raw = vec![TagBlock { tags: Some(tags.clone()) }];
            let weights = normalize(&raw, 0.1);

            for w in weights.values() {
                // Collisions can sum past 1.0; individual scaled weights
                // stay in (0, 1], so the sum is bounded by the input size.
                prop_assert!(*w > 0.0);
                prop_assert!(*w <= tags.len() as f64);
            }

            // The maximum-count tag always survives with weight >= 1.0
            // (exactly 1.0 absent a casing collision).
            let max = tags.iter().map(|(_, c)| *c).fold(0.0_f64, f64::max);
            let (argmax, _) = tags.iter().find(|(_, c)| *c == max).unwrap();
            let key = canonicalize(argmax);
            prop_assert!(weights.get(&key).copied().unwrap_or(0.0) >= 1.0);
        }
    }
}
