//! Discogs source adapter.
//!
//! Discogs exposes a database search API whose results carry categorical
//! `genre` and `style` fields rather than popularity counts. The adapter
//! merges both fields across all master and release results into a single
//! zero-count tag set; the normalizer's rank fallback turns that into
//! usable weights. Only album search is available, so artist and by-id
//! queries report `Unsupported`.

use std::collections::HashSet;

use serde::Deserialize;

use crate::client::{Method, ProviderError, RateLimitedClient, decode_json};
use crate::providers::{Entity, SourceReply, TagBlock, TagSource, TrackMeta};

const SEARCH_URL: &str = "https://api.discogs.com/database/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    genre: Vec<String>,
    #[serde(default)]
    style: Vec<String>,
}

pub struct Discogs {
    client: RateLimitedClient,
    /// Personal access token; searches run unauthenticated without one.
    token: Option<String>,
}

impl Discogs {
    pub fn new(client: RateLimitedClient, token: Option<String>) -> Self {
        Self { client, token }
    }
}

/// Merge genre + style fields across master/release results into one
/// deduplicated, first-seen-ordered tag set with all-zero counts.
fn merge_search_results(results: &[SearchResult]) -> Vec<(String, f64)> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut tags: Vec<(String, f64)> = Vec::new();

    for result in results {
        if !matches!(result.kind.as_deref(), Some("master") | Some("release")) {
            continue;
        }
        for tag in result.genre.iter().chain(result.style.iter()) {
            if seen.insert(tag.as_str()) {
                tags.push((tag.clone(), 0.0));
            }
        }
    }
    tags
}

impl TagSource for Discogs {
    fn id(&self) -> &'static str {
        "discogs"
    }

    fn query_artist(&mut self, _meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        Ok(SourceReply::Unsupported)
    }

    fn query_album(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        let Some(album) = meta.album.as_deref() else {
            return Ok(SourceReply::empty());
        };

        let mut params: Vec<(&str, String)> = vec![("release_title", album.to_string())];
        if let Some(artist) = &meta.artist {
            params.push(("artist", artist.clone()));
        }
        if let Some(year) = meta.year {
            params.push(("year", year.to_string()));
        }
        if let Some(token) = &self.token {
            params.push(("token", token.clone()));
        }

        let reply = self.client.request(SEARCH_URL, &params, Method::Get)?;
        if reply.status == 404 {
            return Ok(SourceReply::empty());
        }

        let parsed: SearchResponse = decode_json(&reply.body)?;
        if parsed.results.is_empty() {
            return Ok(SourceReply::empty());
        }

        let tags = merge_search_results(&parsed.results);
        Ok(SourceReply::Tags(vec![TagBlock { tags: Some(tags) }]))
    }

    fn query_by_id(&mut self, _entity: Entity, _mbid: &str) -> Result<SourceReply, ProviderError> {
        Ok(SourceReply::Unsupported)
    }

    fn stats(&self) -> crate::client::ClientStats {
        self.client.stats()
    }
}
