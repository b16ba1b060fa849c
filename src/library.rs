use crate::model::Track;
use anyhow::{Result, bail};
use lofty::prelude::{Accessor, AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use rodio::{Decoder, Source};
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "opus"];

#[derive(Default)]
struct TrackMetadata {
    title: Option<String>,
    artist: Option<String>,
}

/// Expands the given paths into an ordered track list. Files keep the order
/// they were given in; directories contribute their audio files sorted by
/// path.
pub fn collect_tracks(inputs: &[PathBuf]) -> Result<Vec<Track>> {
    let mut tracks = Vec::new();
    for input in inputs {
        if input.is_dir() {
            tracks.extend(scan_folder(input));
        } else if input.is_file() {
            tracks.push(track_for(input));
        } else {
            bail!("no such file or directory: {}", input.display());
        }
    }
    Ok(tracks)
}

pub fn scan_folder(root: &Path) -> Vec<Track> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_audio(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths.iter().map(|path| track_for(path)).collect()
}

pub fn track_for(path: &Path) -> Track {
    let metadata = metadata_for(path);
    let title = metadata
        .title
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(OsStr::to_str)
                .unwrap_or("unknown")
                .to_string()
        });
    Track::new(path, title, metadata.artist)
}

fn metadata_for(path: &Path) -> TrackMetadata {
    let Ok(tagged_file) = Probe::open(path).and_then(|entry| entry.read()) else {
        return TrackMetadata::default();
    };
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return TrackMetadata::default();
    };

    TrackMetadata {
        title: tag.title().and_then(|value| clean_metadata_value(&value)),
        artist: tag.artist().and_then(|value| clean_metadata_value(&value)),
    }
}

/// Track length in seconds. Tag properties first, then a full decoder probe.
pub fn probe_duration(path: &Path) -> Option<f64> {
    let reported = Probe::open(path)
        .and_then(|entry| entry.read())
        .ok()
        .map(|tagged_file| tagged_file.properties().duration())
        .filter(|duration| !duration.is_zero());
    if let Some(duration) = reported {
        return Some(duration.as_secs_f64());
    }

    let file = File::open(path).ok()?;
    let source = Decoder::try_from(file).ok()?;
    source.total_duration().map(|duration| duration.as_secs_f64())
}

fn clean_metadata_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn is_audio(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    AUDIO_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
