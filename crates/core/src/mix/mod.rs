use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AudioTap, Composition, MediaKind, SourceRangeTap, TrackId};

/// How the engine renders scaled audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePitchAlgorithm {
    /// Pitch follows the rate, like a tape played faster or slower.
    #[default]
    Varispeed,
    /// Pitch preserved, tuned for speech.
    TimeDomain,
    /// Pitch preserved, tuned for music.
    Spectral,
}

/// Per-track mix settings: the pitch algorithm and the tap to attach.
pub struct MixInputParameters {
    track: TrackId,
    pitch_algorithm: TimePitchAlgorithm,
    tap: Option<Box<dyn AudioTap>>,
}

impl MixInputParameters {
    pub fn new(track: TrackId, pitch_algorithm: TimePitchAlgorithm) -> Self {
        Self {
            track,
            pitch_algorithm,
            tap: None,
        }
    }

    pub fn with_tap(mut self, tap: Box<dyn AudioTap>) -> Self {
        self.tap = Some(tap);
        self
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn pitch_algorithm(&self) -> TimePitchAlgorithm {
        self.pitch_algorithm
    }

    pub fn has_tap(&self) -> bool {
        self.tap.is_some()
    }

    /// Hands the tap over to the engine that will drive it.
    pub fn take_tap(&mut self) -> Option<Box<dyn AudioTap>> {
        self.tap.take()
    }
}

impl fmt::Debug for MixInputParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixInputParameters")
            .field("track", &self.track)
            .field("pitch_algorithm", &self.pitch_algorithm)
            .field("tap", &self.tap.is_some())
            .finish()
    }
}

/// Input parameters for the audio tracks of one composition.
#[derive(Debug, Default)]
pub struct AudioMix {
    inputs: Vec<MixInputParameters>,
}

impl AudioMix {
    /// One input per audio track, each with a tap made by `tap_for`.
    pub fn for_composition<F>(
        composition: &Composition,
        pitch_algorithm: TimePitchAlgorithm,
        mut tap_for: F,
    ) -> Self
    where
        F: FnMut(TrackId) -> Box<dyn AudioTap>,
    {
        let inputs = composition
            .tracks(MediaKind::Audio)
            .map(|track| MixInputParameters::new(track, pitch_algorithm).with_tap(tap_for(track)))
            .collect();
        Self { inputs }
    }

    /// Attaches a [`SourceRangeTap`] to every audio track.
    pub fn source_range_taps(
        composition: &Composition,
        pitch_algorithm: TimePitchAlgorithm,
    ) -> Self {
        Self::for_composition(composition, pitch_algorithm, |track| {
            Box::new(SourceRangeTap::new(track))
        })
    }

    pub fn inputs(&self) -> &[MixInputParameters] {
        &self.inputs
    }

    pub fn input_mut(&mut self, track: TrackId) -> Option<&mut MixInputParameters> {
        self.inputs.iter_mut().find(|input| input.track == track)
    }

    pub fn into_inputs(self) -> Vec<MixInputParameters> {
        self.inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GapPolicy, MediaTime, SourceMedia, Variant};

    fn composition(variant: Variant) -> Composition {
        let media =
            SourceMedia::audio_video("video.mp4", MediaTime::from_secs(8), MediaTime::from_secs(8));
        variant.build(&media, GapPolicy::Reject).unwrap()
    }

    #[test]
    fn attaches_one_tap_per_audio_track() {
        let composition = composition(Variant::TwoAudioTracks);
        let mix = AudioMix::source_range_taps(&composition, TimePitchAlgorithm::Varispeed);

        let tracks: Vec<_> = mix.inputs().iter().map(MixInputParameters::track).collect();
        assert_eq!(tracks, composition.tracks(MediaKind::Audio).collect::<Vec<_>>());
        assert!(mix.inputs().iter().all(MixInputParameters::has_tap));
        assert!(mix
            .inputs()
            .iter()
            .all(|input| input.pitch_algorithm() == TimePitchAlgorithm::Varispeed));
    }

    #[test]
    fn taps_can_be_taken_once() {
        let composition = composition(Variant::OneAudioTrack);
        let mut mix = AudioMix::source_range_taps(&composition, TimePitchAlgorithm::Spectral);
        let track = composition.tracks(MediaKind::Audio).next().unwrap();

        let input = mix.input_mut(track).unwrap();
        assert!(input.take_tap().is_some());
        assert!(input.take_tap().is_none());
    }
}
