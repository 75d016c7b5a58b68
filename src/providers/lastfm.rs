//! Last.fm source adapter.
//!
//! Last.fm's audioscrobbler API returns community tags with per-tag
//! popularity counts via the gettoptags methods. An `error` field in an
//! otherwise valid response means "nothing known", not a failure. When a
//! result has exactly one tag the API returns a bare object instead of a
//! list; both shapes are accepted.

use serde::Deserialize;

use crate::client::{Method, ProviderError, RateLimitedClient, decode_json};
use crate::providers::{Entity, SourceReply, TagBlock, TagSource, TrackMeta};

const API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Album queries without a known artist fall back to this, matching the
/// API's convention for compilations.
const UNKNOWN_ARTIST: &str = "Various Artists";

#[derive(Debug, Deserialize)]
struct TopTagsResponse {
    toptags: Option<TopTags>,
    error: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopTags {
    tag: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<LastfmTag>),
    One(Box<LastfmTag>),
}

#[derive(Debug, Deserialize)]
struct LastfmTag {
    name: String,
    #[serde(default)]
    count: f64,
}

pub struct Lastfm {
    client: RateLimitedClient,
    api_key: String,
}

impl Lastfm {
    pub fn new(client: RateLimitedClient, api_key: String) -> Self {
        Self { client, api_key }
    }

    fn query(&mut self, mut params: Vec<(&'static str, String)>) -> Result<SourceReply, ProviderError> {
        params.push(("format", "json".to_string()));
        params.push(("api_key", self.api_key.clone()));

        let reply = self.client.request(API_URL, &params, Method::Get)?;
        if reply.status == 404 {
            return Ok(SourceReply::empty());
        }

        let parsed: TopTagsResponse = decode_json(&reply.body)?;
        Ok(reshape(parsed))
    }
}

/// Reshape a toptags response into the generic tag-count form.
///
/// A missing `tag` field yields a block with no tag map, which the
/// normalizer rejects; that is the intended shape policy.
fn reshape(parsed: TopTagsResponse) -> SourceReply {
    if let Some(code) = parsed.error {
        log::debug!(
            "lastfm error {code}: {}",
            parsed.message.as_deref().unwrap_or("")
        );
        return SourceReply::empty();
    }

    let tags = parsed.toptags.and_then(|t| t.tag).map(|tag| {
        let list = match tag {
            OneOrMany::Many(list) => list,
            OneOrMany::One(one) => vec![*one],
        };
        list.into_iter().map(|t| (t.name, t.count)).collect()
    });

    SourceReply::Tags(vec![TagBlock { tags }])
}

impl TagSource for Lastfm {
    fn id(&self) -> &'static str {
        "lastfm"
    }

    fn query_artist(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        let Some(artist) = meta.artist.clone() else {
            return Ok(SourceReply::empty());
        };
        self.query(vec![
            ("method", "artist.gettoptags".to_string()),
            ("artist", artist),
        ])
    }

    fn query_album(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        let Some(album) = meta.album.clone() else {
            return Ok(SourceReply::empty());
        };
        let artist = meta
            .artist
            .clone()
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        self.query(vec![
            ("method", "album.gettoptags".to_string()),
            ("album", album),
            ("artist", artist),
        ])
    }

    fn query_by_id(&mut self, entity: Entity, mbid: &str) -> Result<SourceReply, ProviderError> {
        match entity {
            Entity::Artist => self.query(vec![
                ("method", "artist.gettoptags".to_string()),
                ("mbid", mbid.to_string()),
            ]),
            // album.gettoptags by mbid rejects requests without an artist
            // param, so the text query handles albums instead.
            Entity::Album => Ok(SourceReply::Unsupported),
        }
    }

    fn stats(&self) -> crate::client::ClientStats {
        self.client.stats()
    }
}
