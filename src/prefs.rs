use std::collections::{BTreeMap, BTreeSet};

use crate::normalize::{canonicalize, round3};

/// A tag with its final score after preference weighting.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTag {
    pub tag: String,
    pub score: f64,
}

/// User-curated tag preferences applied as score multipliers.
///
/// Membership is case-sensitive on the canonicalized tag form; the lists
/// are canonicalized once at construction. A tag appearing in several
/// lists resolves first-matched-wins in priority order
/// hate > dislike > like > love.
#[derive(Debug, Clone, Default)]
pub struct PreferenceLists {
    hate: BTreeSet<String>,
    dislike: BTreeSet<String>,
    like: BTreeSet<String>,
    love: BTreeSet<String>,
}

impl PreferenceLists {
    pub fn new<S: AsRef<str>>(hate: &[S], dislike: &[S], like: &[S], love: &[S]) -> Self {
        let canon = |tags: &[S]| {
            tags.iter()
                .map(|t| canonicalize(t.as_ref()))
                .collect::<BTreeSet<String>>()
        };
        Self {
            hate: canon(hate),
            dislike: canon(dislike),
            like: canon(like),
            love: canon(love),
        }
    }

    /// Score multiplier for a canonicalized tag.
    pub fn multiplier(&self, tag: &str) -> f64 {
        if self.hate.contains(tag) {
            0.0
        } else if self.dislike.contains(tag) {
            0.5
        } else if self.like.contains(tag) {
            1.5
        } else if self.love.contains(tag) {
            3.0
        } else {
            1.0
        }
    }
}

/// Apply preference multipliers to a unified score map.
///
/// Hated tags are not removed: they stay in the result with score 0 and can
/// still be selected when too few alternatives are available.
pub fn score(unified: &BTreeMap<String, f64>, prefs: &PreferenceLists) -> Vec<ScoredTag> {
    unified
        .iter()
        .map(|(tag, unified_score)| ScoredTag {
            tag: tag.clone(),
            score: round3(unified_score * prefs.multiplier(tag)),
        })
        .collect()
}
