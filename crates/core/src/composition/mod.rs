use crate::{GapPolicy, MediaKind, MediaTime, Result, ScaledTapError, Track, TrackId};

/// Parallel tracks sharing one playback timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    tracks: Vec<Track>,
    next_id: u32,
    gap_policy: GapPolicy,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            gap_policy: GapPolicy::default(),
        }
    }

    /// Sets the gap policy given to tracks created from now on.
    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    /// Creates an empty track and returns its handle.
    pub fn add_track(&mut self, kind: MediaKind) -> TrackId {
        let id = TrackId::new(self.next_id);
        self.next_id += 1;
        self.tracks
            .push(Track::new(id, kind).with_gap_policy(self.gap_policy));
        id
    }

    pub fn track(&self, id: TrackId) -> Result<&Track> {
        self.tracks
            .iter()
            .find(|track| track.id() == id)
            .ok_or(ScaledTapError::UnknownTrack(id))
    }

    pub fn track_mut(&mut self, id: TrackId) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|track| track.id() == id)
            .ok_or(ScaledTapError::UnknownTrack(id))
    }

    /// Handles of the tracks of `kind`, in creation order. The iterator can be
    /// cloned to walk the tracks again.
    pub fn tracks(&self, kind: MediaKind) -> impl Iterator<Item = TrackId> + Clone + '_ {
        self.tracks
            .iter()
            .filter(move |track| track.kind() == kind)
            .map(Track::id)
    }

    pub fn all_tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// End of the furthest-reaching track.
    pub fn duration(&self) -> MediaTime {
        self.tracks
            .iter()
            .filter(|track| !track.is_empty())
            .map(|track| track.extent().end())
            .max()
            .unwrap_or(MediaTime::ZERO)
    }

    pub fn validate(&self) -> Result<()> {
        self.tracks.iter().try_for_each(Track::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InsertAt, SourceMedia, TimeRange};

    #[test]
    fn hands_out_sequential_ids() {
        let mut composition = Composition::new();
        let video = composition.add_track(MediaKind::Video);
        let audio = composition.add_track(MediaKind::Audio);

        assert_eq!(video, TrackId::new(1));
        assert_eq!(audio, TrackId::new(2));
        assert_eq!(composition.track(audio).unwrap().kind(), MediaKind::Audio);
        assert!(composition.track(TrackId::new(9)).is_err());
    }

    #[test]
    fn filters_tracks_by_kind_and_restarts() {
        let mut composition = Composition::new();
        composition.add_track(MediaKind::Video);
        let first = composition.add_track(MediaKind::Audio);
        let second = composition.add_track(MediaKind::Audio);

        let audio = composition.tracks(MediaKind::Audio);
        assert_eq!(audio.clone().collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(audio.count(), 2);
        assert_eq!(composition.tracks(MediaKind::Video).count(), 1);
    }

    #[test]
    fn duration_is_furthest_track_end() {
        let media = SourceMedia::audio_video(
            "clip.mp4",
            MediaTime::from_secs(10),
            MediaTime::from_secs(10),
        );
        let source = media.first_track(MediaKind::Audio).unwrap();
        let mut composition = Composition::new();
        let short = composition.add_track(MediaKind::Audio);
        let long = composition.add_track(MediaKind::Audio);
        composition.add_track(MediaKind::Audio);

        composition
            .track_mut(short)
            .unwrap()
            .insert(&media, TimeRange::from_secs(0, 2), source, InsertAt::Append)
            .unwrap();
        composition
            .track_mut(long)
            .unwrap()
            .insert(&media, TimeRange::from_secs(0, 3), source, MediaTime::from_secs(4))
            .unwrap();

        assert_eq!(composition.duration(), MediaTime::from_secs(7));
        composition.validate().unwrap();
    }

    #[test]
    fn new_tracks_inherit_gap_policy() {
        let mut composition = Composition::new().with_gap_policy(GapPolicy::Materialize);
        let id = composition.add_track(MediaKind::Audio);
        assert_eq!(composition.track(id).unwrap().gap_policy(), GapPolicy::Materialize);
    }
}
