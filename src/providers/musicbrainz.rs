//! MusicBrainz source adapter.
//!
//! MusicBrainz supports both free-text search (artist, release-group) and
//! direct lookup by MBID with `inc=tags`. Searches are capped at one
//! result; each result becomes one block, so anything other than a single
//! match is rejected downstream by the block-shape policy.

use serde::Deserialize;

use crate::client::{Method, ProviderError, RateLimitedClient, decode_json};
use crate::providers::{Entity, RawTagResponse, SourceReply, TagBlock, TagSource, TrackMeta};

const API_BASE: &str = "https://musicbrainz.org/ws/2";

#[derive(Debug, Deserialize)]
struct MbTag {
    name: String,
    #[serde(default)]
    count: f64,
}

#[derive(Debug, Deserialize)]
struct MbEntity {
    #[serde(default)]
    tags: Vec<MbTag>,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    error: Option<String>,
    #[serde(default)]
    artists: Vec<MbEntity>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupSearchResponse {
    error: Option<String>,
    #[serde(default, rename = "release-groups")]
    release_groups: Vec<MbEntity>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    error: Option<String>,
    #[serde(default)]
    tags: Vec<MbTag>,
}

pub struct MusicBrainz {
    client: RateLimitedClient,
}

impl MusicBrainz {
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    fn search(&mut self, path: &str, query: String) -> Result<Option<String>, ProviderError> {
        let params = [
            ("query", query),
            ("fmt", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        let url = format!("{API_BASE}/{path}");
        let reply = self.client.request(&url, &params, Method::Get)?;
        if reply.status == 404 {
            return Ok(None);
        }
        Ok(Some(reply.body))
    }

    fn lookup(&mut self, path: &str, mbid: &str) -> Result<SourceReply, ProviderError> {
        let params = [("inc", "tags".to_string()), ("fmt", "json".to_string())];
        let url = format!("{API_BASE}/{path}/{mbid}");
        let reply = self.client.request(&url, &params, Method::Get)?;
        if reply.status == 404 {
            return Ok(SourceReply::empty());
        }

        let parsed: LookupResponse = decode_json(&reply.body)?;
        if let Some(error) = parsed.error {
            log::debug!("musicbrainz error: {error}");
            return Ok(SourceReply::empty());
        }
        Ok(SourceReply::Tags(vec![block(&parsed.tags)]))
    }
}

/// One result entity becomes one block of (name, count) pairs.
fn block(tags: &[MbTag]) -> TagBlock {
    TagBlock {
        tags: Some(tags.iter().map(|t| (t.name.clone(), t.count)).collect()),
    }
}

fn blocks(entities: &[MbEntity]) -> RawTagResponse {
    entities.iter().map(|e| block(&e.tags)).collect()
}

impl TagSource for MusicBrainz {
    fn id(&self) -> &'static str {
        "musicbrainz"
    }

    fn query_artist(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        let Some(artist) = meta.artist.as_deref() else {
            return Ok(SourceReply::empty());
        };
        let Some(body) = self.search("artist", format!("artist: {artist}"))? else {
            return Ok(SourceReply::empty());
        };

        let parsed: ArtistSearchResponse = decode_json(&body)?;
        if let Some(error) = parsed.error {
            log::debug!("musicbrainz error: {error}");
            return Ok(SourceReply::empty());
        }
        Ok(SourceReply::Tags(blocks(&parsed.artists)))
    }

    fn query_album(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        let Some(album) = meta.album.as_deref() else {
            return Ok(SourceReply::empty());
        };
        let Some(body) = self.search("release-group", format!("releasegroup: {album}"))? else {
            return Ok(SourceReply::empty());
        };

        let parsed: ReleaseGroupSearchResponse = decode_json(&body)?;
        if let Some(error) = parsed.error {
            log::debug!("musicbrainz error: {error}");
            return Ok(SourceReply::empty());
        }
        Ok(SourceReply::Tags(blocks(&parsed.release_groups)))
    }

    fn query_by_id(&mut self, entity: Entity, mbid: &str) -> Result<SourceReply, ProviderError> {
        let path = match entity {
            Entity::Artist => "artist",
            Entity::Album => "release-group",
        };
        self.lookup(path, mbid)
    }

    fn stats(&self) -> crate::client::ClientStats {
        self.client.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artist_search_deserialize() {
        let json = r#"{
            "artists": [
                {"id": "x", "name": "Orbital", "tags": [
                    {"name": "techno", "count": 12},
                    {"name": "ambient", "count": 5}
                ]}
            ]
        }"#;
        let parsed: ArtistSearchResponse = serde_json::from_str(json).unwrap();
        let raw = blocks(&parsed.artists);
        assert_eq!(raw.len(), 1);
        assert_eq!(
            raw[0].tags,
            Some(vec![("techno".to_string(), 12.0), ("ambient".to_string(), 5.0)])
        );
    }

    #[test]
    fn test_release_group_field_name() {
        let json = r#"{"release-groups": [{"tags": [{"name": "idm", "count": 3}]}]}"#;
        let parsed: ReleaseGroupSearchResponse = serde_json::from_str(json).unwrap();
        let raw = blocks(&parsed.release_groups);
        assert_eq!(raw[0].tags, Some(vec![("idm".to_string(), 3.0)]));
    }

    #[test]
    fn test_missing_tags_become_empty_map() {
        // An entity without tags still produces a usable (empty) block.
        let json = r#"{"artists": [{"id": "x", "name": "Nobody"}]}"#;
        let parsed: ArtistSearchResponse = serde_json::from_str(json).unwrap();
        let raw = blocks(&parsed.artists);
        assert_eq!(raw[0].tags, Some(vec![]));
    }

    #[test]
    fn test_multiple_results_become_multiple_blocks() {
        let json = r#"{"artists": [{"tags": []}, {"tags": []}]}"#;
        let parsed: ArtistSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(blocks(&parsed.artists).len(), 2);
    }

    #[test]
    fn test_lookup_deserialize() {
        let json = r#"{"id": "y", "tags": [{"name": "krautrock", "count": 9}]}"#;
        let parsed: LookupResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.error.is_none());
        assert_eq!(block(&parsed.tags).tags, Some(vec![("krautrock".to_string(), 9.0)]));
    }

    #[test]
    fn test_error_field_deserialize() {
        let json = r#"{"error": "Not Found"}"#;
        let parsed: LookupResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("Not Found"));
    }
}
