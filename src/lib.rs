pub mod aggregate;
pub mod cache;
pub mod client;
pub mod config;
pub mod library;
pub mod normalize;
pub mod pipeline;
pub mod prefs;
pub mod providers;
pub mod select;
pub mod stats;

/// Audio file extensions we support
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "m4a", "aac", "opus", "wav", "aif", "aiff", "wv", "ape",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "genrevote";

/// User-Agent sent with every API request
pub const USER_AGENT: &str = concat!("genrevote/", env!("CARGO_PKG_VERSION"));
