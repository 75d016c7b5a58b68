use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use lofty::tag::Tag;
use thiserror::Error;
use walkdir::WalkDir;

use crate::providers::TrackMeta;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Tag error for {path}: {message}")]
    Tag { path: String, message: String },
}

/// One audio file with the metadata needed for genre queries.
#[derive(Debug)]
pub struct LibraryTrack {
    pub path: PathBuf,
    pub meta: TrackMeta,
    pub genre: Option<String>,
}

impl LibraryTrack {
    /// Whether this track's genre needs fixing: missing, empty, or a
    /// multi-valued leftover with '/' or ',' separators.
    pub fn needs_fix(&self) -> bool {
        match self.genre.as_deref() {
            None | Some("") => true,
            Some(genre) => genre.contains('/') || genre.contains(','),
        }
    }
}

/// Collect audio files under the given paths, reading query metadata from
/// their tags. Unreadable files are kept with empty metadata; they simply
/// produce no usable queries.
pub fn collect_tracks(paths: &[String]) -> Vec<LibraryTrack> {
    let mut tracks = Vec::new();

    for path in paths {
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if crate::SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                tracks.push(read_track(entry.path()));
            }
        }
    }

    // Deterministic processing order regardless of directory layout
    tracks.sort_by(|a, b| a.path.cmp(&b.path));
    tracks
}

/// Read query metadata from a file's tags.
fn read_track(path: &Path) -> LibraryTrack {
    let empty = || LibraryTrack {
        path: path.to_path_buf(),
        meta: TrackMeta::default(),
        genre: None,
    };

    let tagged_file = match lofty::read_from_path(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("Could not read tags from {}: {}", path.display(), e);
            return empty();
        }
    };

    // Try primary tag, then fall back
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
    let tag = match tag {
        Some(t) => t,
        None => return empty(),
    };

    LibraryTrack {
        path: path.to_path_buf(),
        meta: TrackMeta {
            artist: tag.artist().map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            artist_mbid: tag
                .get_string(&ItemKey::MusicBrainzArtistId)
                .map(|s| s.to_string()),
            album_mbid: tag
                .get_string(&ItemKey::MusicBrainzReleaseGroupId)
                .map(|s| s.to_string()),
            year: tag.year().map(|y| y as i32),
        },
        genre: tag.genre().map(|s| s.to_string()),
    }
}

/// Write the decided genre back to the file's primary tag.
pub fn write_genre(path: &Path, genre: &str) -> Result<(), LibraryError> {
    let tag_error = |message: String| LibraryError::Tag {
        path: path.display().to_string(),
        message,
    };

    let mut tagged_file = lofty::read_from_path(path).map_err(|e| tag_error(e.to_string()))?;

    if tagged_file.primary_tag_mut().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    if let Some(tag) = tagged_file.primary_tag_mut() {
        tag.set_genre(genre.to_string());
    }

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| tag_error(e.to_string()))
}
