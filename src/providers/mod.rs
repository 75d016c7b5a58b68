pub mod discogs;
pub mod lastfm;
pub mod musicbrainz;

use std::time::Duration;

use crate::client::{ClientStats, ProviderError, RateLimitedClient};

/// Metadata available for one track when querying sources.
#[derive(Debug, Clone, Default)]
pub struct TrackMeta {
    pub artist: Option<String>,
    pub album: Option<String>,
    /// MusicBrainz artist id, when the track's tags carry one.
    pub artist_mbid: Option<String>,
    /// MusicBrainz release-group id, when the track's tags carry one.
    pub album_mbid: Option<String>,
    pub year: Option<i32>,
}

/// One result block from a source.
///
/// Tag pairs keep response order; a missing tag field is distinct from an
/// empty one and both normalize to nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct TagBlock {
    pub tags: Option<Vec<(String, f64)>>,
}

pub type RawTagResponse = Vec<TagBlock>;

/// Entity kinds addressable by a stable external identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Artist,
    Album,
}

/// Outcome of a source query.
///
/// `Unsupported` is capability absence, a first-class non-error outcome:
/// the pipeline treats it like an empty result and never aborts on it.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceReply {
    Tags(RawTagResponse),
    Unsupported,
}

impl SourceReply {
    /// A supported query that found nothing.
    pub fn empty() -> Self {
        SourceReply::Tags(Vec::new())
    }
}

/// Capability interface implemented by every source adapter.
///
/// Adapters shape requests and reshape responses only; rate limiting,
/// caching and retries all live in the adapter's [`RateLimitedClient`].
pub trait TagSource {
    fn id(&self) -> &'static str;
    fn query_artist(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError>;
    fn query_album(&mut self, meta: &TrackMeta) -> Result<SourceReply, ProviderError>;
    fn query_by_id(&mut self, entity: Entity, mbid: &str) -> Result<SourceReply, ProviderError>;
    fn stats(&self) -> ClientStats;
}

/// The closed set of supported sources. Unknown names fail configuration
/// validation at load time, not at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Discogs,
    Lastfm,
    MusicBrainz,
}

impl SourceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "discogs" => Some(Self::Discogs),
            "lastfm" => Some(Self::Lastfm),
            "musicbrainz" => Some(Self::MusicBrainz),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Discogs => "discogs",
            Self::Lastfm => "lastfm",
            Self::MusicBrainz => "musicbrainz",
        }
    }

    /// Minimum delay between network requests, per each source's API terms.
    pub fn default_rate_limit(&self) -> Duration {
        match self {
            Self::Discogs => Duration::from_millis(3000),
            Self::Lastfm => Duration::from_millis(250),
            Self::MusicBrainz => Duration::from_millis(2000),
        }
    }

    /// Build the adapter for this source.
    ///
    /// `credential` is the Last.fm api_key or the Discogs personal access
    /// token; MusicBrainz needs none. Credential presence is validated at
    /// config load, before any adapter is built.
    pub fn build(
        self,
        client: RateLimitedClient,
        credential: Option<String>,
    ) -> Box<dyn TagSource> {
        match self {
            Self::Discogs => Box::new(discogs::Discogs::new(client, credential)),
            Self::Lastfm => Box::new(lastfm::Lastfm::new(client, credential.unwrap_or_default())),
            Self::MusicBrainz => Box::new(musicbrainz::MusicBrainz::new(client)),
        }
    }
}
