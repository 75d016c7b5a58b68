use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::aggregate::{Contribution, aggregate};
use crate::cache::CacheStore;
use crate::client::{ClientStats, ProviderError, RateLimitedClient};
use crate::config::{AppConfig, ConfigError};
use crate::normalize::normalize;
use crate::prefs::{PreferenceLists, score};
use crate::providers::{Entity, RawTagResponse, SourceReply, TagSource, TrackMeta};
use crate::select::{GenreDecision, select};

/// Per-source result counters, tallied as replies arrive.
#[derive(Debug, Clone, Default)]
pub struct ResultCounters {
    /// Queries that produced exactly one result block.
    pub results: u64,
    /// Queries that produced no result blocks.
    pub results_none: u64,
    /// Queries that produced more than one block (rejected downstream).
    pub results_many: u64,
    /// Total raw tags seen across usable results.
    pub tags: u64,
    /// Reserved: referenced by the report, never populated by any adapter.
    pub goodtags: u64,
}

/// One configured source with its adapter and bookkeeping.
pub struct SourceHandle {
    pub id: &'static str,
    pub weight: f64,
    pub source: Box<dyn TagSource>,
    pub counters: ResultCounters,
}

/// Snapshot of one source's statistics after a run.
pub struct SourceStats {
    pub id: &'static str,
    pub client: ClientStats,
    pub counters: ResultCounters,
}

/// Per-run state for resolving tracks: enabled sources, query-type
/// weights, preferences, and selection settings. Built once at invocation
/// start and passed down; nothing here is process-global.
pub struct Pipeline {
    sources: Vec<SourceHandle>,
    query_types: Vec<(String, f64)>,
    prefs: PreferenceLists,
    max_tags: usize,
    tag_glue: String,
    floor: f64,
    abort: Arc<AtomicBool>,
}

impl Pipeline {
    /// Assemble a pipeline from validated config. Fails before any track
    /// is processed when the config is unusable.
    pub fn from_config(config: &AppConfig, cache: Arc<CacheStore>) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let ttl_days = config.cache.ttl_days;

        let mut sources = Vec::new();
        for enabled in config.enabled_sources()? {
            let client =
                RateLimitedClient::new(cache.clone(), enabled.rate_limit, ttl_days, timeout);
            sources.push(SourceHandle {
                id: enabled.kind.name(),
                weight: enabled.weight,
                source: enabled.kind.build(client, enabled.credential),
                counters: ResultCounters::default(),
            });
        }

        let prefs = PreferenceLists::new(&config.hate, &config.dislike, &config.like, &config.love);

        Ok(Self::new(
            sources,
            config.active_query_types(),
            prefs,
            config.max_tags,
            config.tag_glue.clone(),
            config.floor,
        ))
    }

    pub fn new(
        sources: Vec<SourceHandle>,
        query_types: Vec<(String, f64)>,
        prefs: PreferenceLists,
        max_tags: usize,
        tag_glue: String,
        floor: f64,
    ) -> Self {
        Self {
            sources,
            query_types,
            prefs,
            max_tags,
            tag_glue,
            floor,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run-level abort signal: once set, no new requests are issued; work
    /// already fetched still flows through normalization and selection.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Resolve one track into a genre decision.
    ///
    /// Every (source, query-type) attempt is best-effort: provider errors
    /// and unsupported capabilities become empty contributions, never
    /// failures. A track with zero usable tag data yields "no change".
    pub fn process_track(&mut self, meta: &TrackMeta, current_genre: Option<&str>) -> GenreDecision {
        let mut contributions: Vec<Contribution> = Vec::new();

        'sources: for handle in &mut self.sources {
            for (query_type, type_weight) in &self.query_types {
                if self.abort.load(Ordering::Relaxed) {
                    log::info!("Abort requested, not issuing further requests");
                    break 'sources;
                }

                let reply = match query_type.as_str() {
                    "artist" => query_artist(handle, meta),
                    "album" => query_album(handle, meta),
                    other => {
                        log::error!("{}: unknown query type '{other}'", handle.id);
                        continue;
                    }
                };

                let raw = match reply {
                    Ok(SourceReply::Tags(raw)) => raw,
                    Ok(SourceReply::Unsupported) => {
                        log::debug!("{}: {query_type} query unsupported", handle.id);
                        continue;
                    }
                    Err(e) => {
                        log::warn!("{}: {query_type} query failed: {e}", handle.id);
                        continue;
                    }
                };

                tally(&mut handle.counters, &raw);

                let weights = normalize(&raw, self.floor);
                if weights.is_empty() {
                    continue;
                }
                log::debug!("{}: {query_type} tags {weights:?}", handle.id);
                contributions.push(Contribution {
                    source_weight: handle.weight,
                    query_weight: *type_weight,
                    weights,
                });
            }
        }

        let unified = aggregate(&contributions);
        let scored = score(&unified, &self.prefs);
        select(&scored, self.max_tags, &self.tag_glue, current_genre)
    }

    /// Statistics snapshot for the end-of-run report.
    pub fn source_stats(&self) -> Vec<SourceStats> {
        self.sources
            .iter()
            .map(|handle| SourceStats {
                id: handle.id,
                client: handle.source.stats(),
                counters: handle.counters.clone(),
            })
            .collect()
    }
}

/// Artist query, preferring the stable MusicBrainz id when the track has
/// one and the source can use it.
fn query_artist(handle: &mut SourceHandle, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
    if let Some(mbid) = meta.artist_mbid.as_deref() {
        match handle.source.query_by_id(Entity::Artist, mbid)? {
            SourceReply::Unsupported => {}
            reply => return Ok(reply),
        }
    }
    handle.source.query_artist(meta)
}

/// Album query, preferring the release-group id when available.
fn query_album(handle: &mut SourceHandle, meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
    if let Some(mbid) = meta.album_mbid.as_deref() {
        match handle.source.query_by_id(Entity::Album, mbid)? {
            SourceReply::Unsupported => {}
            reply => return Ok(reply),
        }
    }
    handle.source.query_album(meta)
}

fn tally(counters: &mut ResultCounters, raw: &RawTagResponse) {
    match raw.len() {
        0 => counters.results_none += 1,
        1 => {
            counters.results += 1;
            counters.tags += raw[0].tags.as_ref().map_or(0, |tags| tags.len()) as u64;
        }
        _ => counters.results_many += 1,
    }
}
