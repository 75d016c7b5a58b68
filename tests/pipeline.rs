//! End-to-end pipeline tests with a stubbed source: no network, no cache.

use genrevote::client::{ClientStats, ProviderError};
use genrevote::pipeline::{Pipeline, ResultCounters, SourceHandle};
use genrevote::prefs::PreferenceLists;
use genrevote::providers::{Entity, SourceReply, TagBlock, TagSource, TrackMeta};

#[derive(Clone)]
enum StubReply {
    Tags(Vec<(&'static str, f64)>),
    Unsupported,
    Fail,
}

struct StubSource {
    artist: StubReply,
    album: StubReply,
    by_id: StubReply,
}

impl StubSource {
    fn new(artist: StubReply, album: StubReply) -> Self {
        Self {
            artist,
            album,
            by_id: StubReply::Unsupported,
        }
    }
}

fn reply(stub: &StubReply) -> Result<SourceReply, ProviderError> {
    match stub {
        StubReply::Tags(tags) => Ok(SourceReply::Tags(vec![TagBlock {
            tags: Some(tags.iter().map(|(t, c)| (t.to_string(), *c)).collect()),
        }])),
        StubReply::Unsupported => Ok(SourceReply::Unsupported),
        StubReply::Fail => Err(ProviderError::Transport("stub failure".to_string())),
    }
}

impl TagSource for StubSource {
    fn id(&self) -> &'static str {
        "stub"
    }

    fn query_artist(&mut self, _meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        reply(&self.artist)
    }

    fn query_album(&mut self, _meta: &TrackMeta) -> Result<SourceReply, ProviderError> {
        reply(&self.album)
    }

    fn query_by_id(&mut self, _entity: Entity, _mbid: &str) -> Result<SourceReply, ProviderError> {
        reply(&self.by_id)
    }

    fn stats(&self) -> ClientStats {
        ClientStats::default()
    }
}

fn handle(weight: f64, source: StubSource) -> SourceHandle {
    SourceHandle {
        id: "stub",
        weight,
        source: Box::new(source),
        counters: ResultCounters::default(),
    }
}

fn meta() -> TrackMeta {
    TrackMeta {
        artist: Some("The Example Band".to_string()),
        album: Some("First Album".to_string()),
        ..TrackMeta::default()
    }
}

#[test]
fn end_to_end_weighted_decision() {
    // Album counts {rock:10, hard rock:4} normalize to {Rock:1.0, Hard Rock:0.4};
    // artist counts {rock:2} normalize to {Rock:1.0}. With album weight 1.0 and
    // artist weight 0.5: Rock = 1.5, Hard Rock = 0.4. Rock is liked (x1.5) => 2.25.
    let source = StubSource::new(
        StubReply::Tags(vec![("rock", 2.0)]),
        StubReply::Tags(vec![("rock", 10.0), ("hard rock", 4.0)]),
    );
    let prefs = PreferenceLists::new(&[], &[], &["rock"], &[]);
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("album".to_string(), 1.0), ("artist".to_string(), 0.5)],
        prefs,
        1,
        ", ".to_string(),
        0.1,
    );

    let decision = pipeline.process_track(&meta(), Some("Pop"));
    assert_eq!(decision.tags, vec!["Rock"]);
    assert_eq!(decision.rendered, "Rock");
    assert!(decision.changed);
}

#[test]
fn second_run_on_unchanged_state_is_no_change() {
    let source = StubSource::new(
        StubReply::Tags(vec![("rock", 2.0)]),
        StubReply::Tags(vec![("rock", 10.0), ("hard rock", 4.0)]),
    );
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("album".to_string(), 1.0), ("artist".to_string(), 0.5)],
        PreferenceLists::default(),
        2,
        ", ".to_string(),
        0.1,
    );

    let first = pipeline.process_track(&meta(), Some("Pop"));
    assert!(first.changed);

    let second = pipeline.process_track(&meta(), Some(first.rendered.as_str()));
    assert!(!second.changed);
    assert_eq!(second.rendered, first.rendered);
}

#[test]
fn failing_source_never_aborts_the_run() {
    let broken = StubSource::new(StubReply::Fail, StubReply::Fail);
    let working = StubSource::new(
        StubReply::Tags(vec![("jazz", 5.0)]),
        StubReply::Unsupported,
    );
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, broken), handle(1.0, working)],
        vec![("artist".to_string(), 1.0), ("album".to_string(), 1.0)],
        PreferenceLists::default(),
        3,
        ", ".to_string(),
        0.1,
    );

    let decision = pipeline.process_track(&meta(), None);
    assert_eq!(decision.tags, vec!["Jazz"]);
    assert!(decision.changed);
}

#[test]
fn track_with_no_usable_data_yields_no_change() {
    let silent = StubSource::new(StubReply::Unsupported, StubReply::Unsupported);
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, silent)],
        vec![("artist".to_string(), 1.0), ("album".to_string(), 1.0)],
        PreferenceLists::default(),
        3,
        ", ".to_string(),
        0.1,
    );

    let decision = pipeline.process_track(&meta(), Some("Rock"));
    assert!(!decision.changed);
    assert!(decision.tags.is_empty());
}

#[test]
fn unknown_query_type_is_skipped_not_fatal() {
    let source = StubSource::new(StubReply::Tags(vec![("folk", 3.0)]), StubReply::Unsupported);
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("track".to_string(), 1.0), ("artist".to_string(), 1.0)],
        PreferenceLists::default(),
        3,
        ", ".to_string(),
        0.1,
    );

    let decision = pipeline.process_track(&meta(), None);
    assert_eq!(decision.tags, vec!["Folk"]);
}

#[test]
fn mbid_lookup_preferred_over_text_search() {
    let mut source = StubSource::new(StubReply::Tags(vec![("wrong", 9.0)]), StubReply::Unsupported);
    source.by_id = StubReply::Tags(vec![("krautrock", 9.0)]);

    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("artist".to_string(), 1.0)],
        PreferenceLists::default(),
        1,
        ", ".to_string(),
        0.1,
    );

    let with_mbid = TrackMeta {
        artist_mbid: Some("8538e728-ca0b-4321-b7e5-cff6565dd4c0".to_string()),
        ..meta()
    };
    let decision = pipeline.process_track(&with_mbid, None);
    assert_eq!(decision.tags, vec!["Krautrock"]);
}

#[test]
fn mbid_lookup_falls_back_when_unsupported() {
    // by_id stays Unsupported: the text query must answer instead.
    let source = StubSource::new(StubReply::Tags(vec![("dub", 4.0)]), StubReply::Unsupported);
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("artist".to_string(), 1.0)],
        PreferenceLists::default(),
        1,
        ", ".to_string(),
        0.1,
    );

    let with_mbid = TrackMeta {
        artist_mbid: Some("8538e728-ca0b-4321-b7e5-cff6565dd4c0".to_string()),
        ..meta()
    };
    let decision = pipeline.process_track(&with_mbid, None);
    assert_eq!(decision.tags, vec!["Dub"]);
}

#[test]
fn hated_tag_selected_when_nothing_else_survives() {
    let source = StubSource::new(StubReply::Tags(vec![("pop", 50.0)]), StubReply::Unsupported);
    let prefs = PreferenceLists::new(&["pop"], &[], &[], &[]);
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("artist".to_string(), 1.0)],
        prefs,
        3,
        ", ".to_string(),
        0.1,
    );

    let decision = pipeline.process_track(&meta(), None);
    assert_eq!(decision.tags, vec!["Pop"]);
}

#[test]
fn abort_flag_stops_new_requests() {
    use std::sync::atomic::Ordering;

    let source = StubSource::new(
        StubReply::Tags(vec![("rock", 5.0)]),
        StubReply::Tags(vec![("rock", 5.0)]),
    );
    let mut pipeline = Pipeline::new(
        vec![handle(1.0, source)],
        vec![("artist".to_string(), 1.0), ("album".to_string(), 1.0)],
        PreferenceLists::default(),
        3,
        ", ".to_string(),
        0.1,
    );

    pipeline.abort_flag().store(true, Ordering::Relaxed);
    let decision = pipeline.process_track(&meta(), Some("Rock"));
    assert!(decision.tags.is_empty());
    assert!(!decision.changed);
}
