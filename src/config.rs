use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::providers::SourceKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown source '{0}' (supported: discogs, lastfm, musicbrainz)")]
    UnknownSource(String),
    #[error("no sources are enabled")]
    NoSourcesEnabled,
    #[error("source '{source_name}' requires '{field}' in the config")]
    MissingCredentials {
        source_name: &'static str,
        field: &'static str,
    },
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directories to process (used when `fix` has no CLI args).
    pub music_dirs: Vec<PathBuf>,
    /// Per-source settings, keyed by source name.
    pub sources: BTreeMap<String, SourceConfig>,
    /// Query-type weights. A weight of 0 disables the query type.
    pub query_types: BTreeMap<String, f64>,
    /// Preference lists, applied as score multipliers.
    pub hate: Vec<String>,
    pub dislike: Vec<String>,
    pub like: Vec<String>,
    pub love: Vec<String>,
    /// Maximum number of tags in the rendered genre string.
    pub max_tags: usize,
    /// Separator between selected tags.
    pub tag_glue: String,
    /// Minimum normalized weight a tag needs to survive (0..=1).
    pub floor: f64,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Response cache settings.
    pub cache: CacheConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut sources = BTreeMap::new();
        // MusicBrainz needs no credentials, so it is the out-of-the-box source.
        sources.insert(
            "musicbrainz".to_string(),
            SourceConfig {
                enabled: true,
                ..SourceConfig::default()
            },
        );
        sources.insert("lastfm".to_string(), SourceConfig::default());
        sources.insert("discogs".to_string(), SourceConfig::default());

        let mut query_types = BTreeMap::new();
        query_types.insert("artist".to_string(), 1.0);
        query_types.insert("album".to_string(), 1.0);

        Self {
            music_dirs: Vec::new(),
            sources,
            query_types,
            hate: Vec::new(),
            dislike: Vec::new(),
            like: Vec::new(),
            love: Vec::new(),
            max_tags: 4,
            tag_glue: ", ".to_string(),
            floor: crate::normalize::DEFAULT_FLOOR,
            timeout_secs: 30,
            cache: CacheConfig::default(),
        }
    }
}

/// Settings for one external source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Relative importance of this source's tags (>= 0).
    pub weight: f64,
    /// Last.fm API key.
    pub api_key: Option<String>,
    /// Discogs personal access token.
    pub token: Option<String>,
    /// Override of the source's built-in rate limit.
    pub rate_limit_ms: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weight: 1.0,
            api_key: None,
            token: None,
            rate_limit_ms: None,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Custom cache database path (overrides XDG default).
    pub path: Option<PathBuf>,
    /// Days before a cached response is treated as absent.
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_days: crate::cache::DEFAULT_TTL_DAYS,
        }
    }
}

/// A source that passed validation and will be queried.
#[derive(Debug, Clone)]
pub struct EnabledSource {
    pub kind: SourceKind,
    pub weight: f64,
    pub credential: Option<String>,
    pub rate_limit: Duration,
}

impl AppConfig {
    /// Load config from `~/.config/genrevote/config.toml`, or from an
    /// explicit path. Returns default config if the file doesn't exist;
    /// logs a warning if it exists but can't be parsed.
    pub fn load(path_override: Option<&Path>) -> Self {
        let config_path = match path_override {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path(),
        };
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Semantic validation, run once at startup before any track is
    /// processed. Unknown source names fail here rather than at query time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tags < 1 {
            return Err(ConfigError::InvalidValue(
                "max_tags must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.floor) {
            return Err(ConfigError::InvalidValue(format!(
                "floor must be within 0..=1, got {}",
                self.floor
            )));
        }
        for (name, weight) in &self.query_types {
            if *weight < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "query type '{name}' has negative weight {weight}"
                )));
            }
        }
        for (name, source) in &self.sources {
            if SourceKind::from_name(name).is_none() {
                return Err(ConfigError::UnknownSource(name.clone()));
            }
            if source.weight < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "source '{name}' has negative weight {}",
                    source.weight
                )));
            }
        }
        Ok(())
    }

    /// Resolve the sources that will actually be queried.
    pub fn enabled_sources(&self) -> Result<Vec<EnabledSource>, ConfigError> {
        self.validate()?;

        let mut enabled = Vec::new();
        for (name, source) in &self.sources {
            if !source.enabled {
                continue;
            }
            // validate() already rejected unknown names
            let Some(kind) = SourceKind::from_name(name) else {
                continue;
            };

            let credential = match kind {
                SourceKind::Lastfm => match source.api_key.as_deref() {
                    Some(key) if !key.is_empty() => Some(key.to_string()),
                    _ => {
                        return Err(ConfigError::MissingCredentials {
                            source_name: "lastfm",
                            field: "api_key",
                        });
                    }
                },
                SourceKind::Discogs => source.token.clone(),
                SourceKind::MusicBrainz => None,
            };

            let rate_limit = source
                .rate_limit_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| kind.default_rate_limit());

            enabled.push(EnabledSource {
                kind,
                weight: source.weight,
                credential,
                rate_limit,
            });
        }

        if enabled.is_empty() {
            return Err(ConfigError::NoSourcesEnabled);
        }
        Ok(enabled)
    }

    /// Query types with a positive weight, in config order.
    pub fn active_query_types(&self) -> Vec<(String, f64)> {
        self.query_types
            .iter()
            .filter(|(_, weight)| **weight > 0.0)
            .map(|(name, weight)| (name.clone(), *weight))
            .collect()
    }

    /// Resolve the cache database path: config override or XDG default.
    pub fn cache_path(&self) -> PathBuf {
        if let Some(path) = &self.cache.path {
            return path.clone();
        }
        if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
            let data_dir = dirs.data_dir();
            std::fs::create_dir_all(data_dir).ok();
            data_dir.join("reqcache.db")
        } else {
            // Fallback: current directory
            PathBuf::from("reqcache.db")
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
