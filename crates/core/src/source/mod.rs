use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{MediaTime, Result, ScaledTapError, TimeRange};

/// Kind of media carried by a source or composition track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Index of a track inside a [`SourceMedia`] table.
///
/// Segments hold this instead of the track itself; the loader owns the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceTrackId(usize);

impl fmt::Display for SourceTrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only description of one track of the loaded asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTrack {
    pub kind: MediaKind,
    pub duration: MediaTime,
}

impl SourceTrack {
    /// The full time range of the track's content.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(MediaTime::ZERO, self.duration)
    }
}

/// Table of source tracks loaded once from the bundled asset.
#[derive(Debug, Clone, Default)]
pub struct SourceMedia {
    name: String,
    tracks: Vec<SourceTrack>,
}

impl SourceMedia {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
        }
    }

    /// Describes an asset with one video and one audio track, which is all the
    /// demo layouts need.
    pub fn audio_video(name: impl Into<String>, video: MediaTime, audio: MediaTime) -> Self {
        let mut media = Self::new(name);
        media.add_track(MediaKind::Video, video);
        media.add_track(MediaKind::Audio, audio);
        media
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_track(&mut self, kind: MediaKind, duration: MediaTime) -> SourceTrackId {
        self.tracks.push(SourceTrack { kind, duration });
        SourceTrackId(self.tracks.len() - 1)
    }

    pub fn track(&self, id: SourceTrackId) -> Result<&SourceTrack> {
        self.tracks
            .get(id.0)
            .ok_or(ScaledTapError::UnknownSourceTrack(id))
    }

    /// First track of the requested kind, mirroring how the asset is loaded.
    pub fn first_track(&self, kind: MediaKind) -> Result<SourceTrackId> {
        self.tracks
            .iter()
            .position(|track| track.kind == kind)
            .map(SourceTrackId)
            .ok_or_else(|| ScaledTapError::msg(format!("`{}` has no {kind} track", self.name)))
    }

    pub fn tracks(&self) -> impl Iterator<Item = (SourceTrackId, &SourceTrack)> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| (SourceTrackId(index), track))
    }
}
