//! The fixed set of layouts used to probe the scaled-segment tap defect.
//!
//! Every layout plays the same two pieces of source audio:
//!
//! ```text
//! time:   0s------1s------2s------3s------4s------5s------6s
//! source: |-------[xxxxxxxxxxxxxxx][yyyyyyyyyyyyyy]
//! ```
//!
//! `x` is played at its natural speed over 0s–2s and `y` at half speed over
//! 2s–6s. Only the track arrangement differs between variants.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Composition, GapPolicy, InsertAt, MediaKind, MediaTime, Result, ScaledTapError, SourceMedia,
    TimeMapping, TimeRange, TrackId,
};

/// Source 1s–3s played over 0s–2s (rate 1).
pub const FIRST_SEGMENT: TimeMapping =
    TimeMapping::new(TimeRange::from_secs(1, 2), TimeRange::from_secs(0, 2));

/// Source 3s–5s played over 2s–6s (rate 0.5).
pub const SECOND_SEGMENT: TimeMapping =
    TimeMapping::new(TimeRange::from_secs(3, 2), TimeRange::from_secs(2, 4));

/// A composition layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// First audio track holds `x`; second holds a gap then scaled `y`.
    /// Triggers the defect.
    TwoAudioTracks,
    /// Scaled `y` on the first audio track, `x` on the second.
    TwoAudioTracksSwapped,
    /// `x` then scaled `y` on a single audio track.
    OneAudioTrack,
    /// A gap then scaled `y` on a single audio track.
    OneAudioTrackWithSilence,
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::TwoAudioTracks,
        Variant::TwoAudioTracksSwapped,
        Variant::OneAudioTrack,
        Variant::OneAudioTrackWithSilence,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::TwoAudioTracks => "two-audio-tracks",
            Variant::TwoAudioTracksSwapped => "two-audio-tracks-swapped",
            Variant::OneAudioTrack => "one-audio-track",
            Variant::OneAudioTrackWithSilence => "one-audio-track-with-silence",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Variant::TwoAudioTracks => "scaled segment after a gap on the second audio track",
            Variant::TwoAudioTracksSwapped => "scaled segment after a gap on the first audio track",
            Variant::OneAudioTrack => "unscaled then scaled segment on one audio track",
            Variant::OneAudioTrackWithSilence => "gap then scaled segment on one audio track",
        }
    }

    /// Builds the layout from the asset's first video and audio tracks.
    pub fn build(&self, media: &SourceMedia, gap_policy: GapPolicy) -> Result<Composition> {
        let composition = self
            .build_tracks(media, gap_policy)
            .and_then(|composition| composition.validate().map(|_| composition))
            .map_err(|source| ScaledTapError::Build {
                variant: *self,
                source: Box::new(source),
            })?;

        tracing::info!(
            variant = self.name(),
            tracks = composition.all_tracks().len(),
            duration = %composition.duration(),
            "built composition"
        );
        Ok(composition)
    }

    fn build_tracks(&self, media: &SourceMedia, gap_policy: GapPolicy) -> Result<Composition> {
        let mut composition = Composition::new().with_gap_policy(gap_policy);
        add_video_track(&mut composition, media)?;

        match self {
            Variant::TwoAudioTracks => {
                let first = composition.add_track(MediaKind::Audio);
                insert_unscaled(&mut composition, media, first, MediaTime::ZERO)?;
                let second = composition.add_track(MediaKind::Audio);
                insert_scaled(&mut composition, media, second, SECOND_SEGMENT.target.start)?;
            }
            Variant::TwoAudioTracksSwapped => {
                let first = composition.add_track(MediaKind::Audio);
                insert_scaled(&mut composition, media, first, SECOND_SEGMENT.target.start)?;
                let second = composition.add_track(MediaKind::Audio);
                insert_unscaled(&mut composition, media, second, MediaTime::ZERO)?;
            }
            Variant::OneAudioTrack => {
                let track = composition.add_track(MediaKind::Audio);
                insert_unscaled(&mut composition, media, track, MediaTime::ZERO)?;
                insert_scaled(&mut composition, media, track, InsertAt::Append)?;
            }
            Variant::OneAudioTrackWithSilence => {
                let track = composition.add_track(MediaKind::Audio);
                insert_scaled(&mut composition, media, track, SECOND_SEGMENT.target.start)?;
            }
        }

        Ok(composition)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = ScaledTapError;

    fn from_str(value: &str) -> Result<Self> {
        Variant::ALL
            .into_iter()
            .find(|variant| variant.name() == value)
            .ok_or_else(|| {
                let known: Vec<_> = Variant::ALL.iter().map(Variant::name).collect();
                ScaledTapError::msg(format!(
                    "unknown variant `{value}` (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Video mirroring the audio timing so picture and sound stay aligned:
/// `x` unscaled, then `y` appended and scaled.
fn add_video_track(composition: &mut Composition, media: &SourceMedia) -> Result<TrackId> {
    let source = media.first_track(MediaKind::Video)?;
    let id = composition.add_track(MediaKind::Video);
    let track = composition.track_mut(id)?;
    track.insert(media, FIRST_SEGMENT.source, source, MediaTime::ZERO)?;
    track.insert(media, SECOND_SEGMENT.source, source, InsertAt::Append)?;
    track.rescale(scale_window(), SECOND_SEGMENT.target.length)?;
    Ok(id)
}

fn insert_unscaled(
    composition: &mut Composition,
    media: &SourceMedia,
    id: TrackId,
    at: impl Into<InsertAt>,
) -> Result<()> {
    let source = media.first_track(MediaKind::Audio)?;
    composition
        .track_mut(id)?
        .insert(media, FIRST_SEGMENT.source, source, at)?;
    Ok(())
}

fn insert_scaled(
    composition: &mut Composition,
    media: &SourceMedia,
    id: TrackId,
    at: impl Into<InsertAt>,
) -> Result<()> {
    let source = media.first_track(MediaKind::Audio)?;
    let track = composition.track_mut(id)?;
    track.insert(media, SECOND_SEGMENT.source, source, at)?;
    track.rescale(scale_window(), SECOND_SEGMENT.target.length)
}

/// The window `y` occupies before scaling: it starts where it will end up and
/// lasts as long as its source.
fn scale_window() -> TimeRange {
    TimeRange::new(SECOND_SEGMENT.target.start, SECOND_SEGMENT.source.length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Segment, Track};

    fn media() -> SourceMedia {
        SourceMedia::audio_video("video.mp4", MediaTime::from_secs(8), MediaTime::from_secs(8))
    }

    fn build(variant: Variant) -> Composition {
        variant.build(&media(), GapPolicy::Reject).unwrap()
    }

    fn audio_tracks(composition: &Composition) -> Vec<&Track> {
        composition
            .tracks(MediaKind::Audio)
            .map(|id| composition.track(id).unwrap())
            .collect()
    }

    fn assert_segment(segment: &Segment, placement: TimeRange, source: TimeRange, rate: f64) {
        assert_eq!(segment.placement(), placement);
        assert_eq!(segment.source_range(), source);
        assert_eq!(segment.rate().unwrap(), rate);
    }

    #[test]
    fn two_audio_tracks_layout() {
        let composition = build(Variant::TwoAudioTracks);
        let audio = audio_tracks(&composition);
        assert_eq!(audio.len(), 2);

        assert_eq!(audio[0].segments().len(), 1);
        assert_segment(
            &audio[0].segments()[0],
            TimeRange::from_secs(0, 2),
            TimeRange::from_secs(1, 2),
            1.0,
        );
        assert_eq!(audio[1].segments().len(), 1);
        assert_segment(
            &audio[1].segments()[0],
            TimeRange::from_secs(2, 4),
            TimeRange::from_secs(3, 2),
            0.5,
        );
        assert_eq!(composition.duration(), MediaTime::from_secs(6));
    }

    #[test]
    fn one_audio_track_layout_matches_two_track_timing() {
        let composition = build(Variant::OneAudioTrack);
        let audio = audio_tracks(&composition);
        assert_eq!(audio.len(), 1);

        let segments = audio[0].segments();
        assert_eq!(segments.len(), 2);
        assert_segment(&segments[0], TimeRange::from_secs(0, 2), TimeRange::from_secs(1, 2), 1.0);
        assert_segment(&segments[1], TimeRange::from_secs(2, 4), TimeRange::from_secs(3, 2), 0.5);
        assert_eq!(composition.duration(), MediaTime::from_secs(6));
    }

    #[test]
    fn swapped_layout_scales_the_first_audio_track() {
        let composition = build(Variant::TwoAudioTracksSwapped);
        let audio = audio_tracks(&composition);

        assert!(audio[0].segments()[0].is_scaled());
        assert!(!audio[1].segments()[0].is_scaled());
        assert_eq!(audio[0].extent(), TimeRange::from_secs(2, 4));
        assert_eq!(audio[1].extent(), TimeRange::from_secs(0, 2));
    }

    #[test]
    fn silence_layout_has_leading_gap() {
        let composition = build(Variant::OneAudioTrackWithSilence);
        let audio = audio_tracks(&composition);
        let slots: Vec<_> = audio[0].slots().collect();

        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_silent());
        assert_eq!(slots[1].range(), TimeRange::from_secs(2, 4));
    }

    #[test]
    fn every_layout_shares_the_video_track() {
        for variant in Variant::ALL {
            let composition = build(variant);
            let video: Vec<_> = composition.tracks(MediaKind::Video).collect();
            assert_eq!(video.len(), 1);

            let segments = composition.track(video[0]).unwrap().segments();
            assert_segment(
                &segments[0],
                TimeRange::from_secs(0, 2),
                TimeRange::from_secs(1, 2),
                1.0,
            );
            assert_segment(
                &segments[1],
                TimeRange::from_secs(2, 4),
                TimeRange::from_secs(3, 2),
                0.5,
            );
            assert_eq!(composition.duration(), MediaTime::from_secs(6));
        }
    }

    #[test]
    fn building_is_deterministic() {
        for variant in Variant::ALL {
            assert_eq!(build(variant), build(variant));
        }
    }

    #[test]
    fn short_source_aborts_with_variant_and_track() {
        let media =
            SourceMedia::audio_video("short.mp4", MediaTime::from_secs(8), MediaTime::from_secs(4));
        let err = Variant::OneAudioTrack
            .build(&media, GapPolicy::Reject)
            .unwrap_err();

        assert!(matches!(err, ScaledTapError::Build { variant: Variant::OneAudioTrack, .. }));
        assert_eq!(err.track(), Some(TrackId::new(2)));
        assert!(format!("{err}").contains("one-audio-track"));
    }

    #[test]
    fn parses_names() {
        for variant in Variant::ALL {
            assert_eq!(variant.name().parse::<Variant>().unwrap(), variant);
        }
        assert!("three-audio-tracks".parse::<Variant>().is_err());
    }
}
