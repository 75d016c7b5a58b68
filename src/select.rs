use std::cmp::Ordering;

use crate::prefs::ScoredTag;

/// Final outcome of a genre decision for one track.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreDecision {
    /// Selected tags, best first, at most `max_tags`.
    pub tags: Vec<String>,
    /// The tags joined with the configured glue string.
    pub rendered: String,
    /// Whether the rendered string differs from the track's current genre.
    pub changed: bool,
}

impl GenreDecision {
    fn unchanged() -> Self {
        Self {
            tags: Vec::new(),
            rendered: String::new(),
            changed: false,
        }
    }
}

/// Rank scored tags and decide the track's genre string.
///
/// Sorting is score descending with ties broken by tag name ascending, so
/// the selection is reproducible run to run. An empty candidate list is
/// always "no change" regardless of the current value; otherwise the
/// rendered string is compared byte-for-byte against `current`.
pub fn select(
    scored: &[ScoredTag],
    max_tags: usize,
    glue: &str,
    current: Option<&str>,
) -> GenreDecision {
    if scored.is_empty() {
        return GenreDecision::unchanged();
    }

    let mut ranked: Vec<&ScoredTag> = scored.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.tag.cmp(&b.tag))
    });
    ranked.truncate(max_tags.max(1));

    let tags: Vec<String> = ranked.iter().map(|s| s.tag.clone()).collect();
    let rendered = tags.join(glue);
    let changed = current != Some(rendered.as_str());

    GenreDecision {
        tags,
        rendered,
        changed,
    }
}
