//! Offline driver for the tap contract.
//!
//! The reference host walks a composition in fixed quanta and plays the role
//! of the platform engine towards each tap: it prepares the tap, asks it to
//! process every quantum with the audio the timeline model says is there, and
//! tears it down. It renders no real audio; buffers hold a constant level
//! over the frames a segment backs and zeros elsewhere.
//!
//! The range each quantum is checked against is resolved from the track
//! separately from what the host hands the tap, so a tap that drops or
//! rewrites ranges shows up as mismatches. Failure counts and observed
//! ranges come from the tap's own log when it keeps one.

use std::thread;

use crate::{
    config::PlaybackConfig, AudioMix, Composition, DefectProbe, MediaTime, PlaybackReport,
    QuantumRecord, Result, ScaledTapError, SourceAudio, SourceAudioProvider,
    SourceRetrievalFailure, TapContext, TapSession, TimePitchAlgorithm, TimeRange, Track,
    TrackFormat, TrackReport, Variant,
};

/// Sample value written for frames backed by source content.
pub const CONTENT_LEVEL: f32 = 0.5;

/// Status reported for injected retrieval failures.
pub const INJECTED_FAILURE_STATUS: i32 = -12_780;

/// Status reported when the model itself cannot resolve a quantum.
pub const MODEL_FAILURE_STATUS: i32 = -12_781;

/// Which quanta the host refuses to supply audio for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultPlan {
    #[default]
    Never,
    /// Fail quanta `n - 1`, `2n - 1`, ...
    EveryNth(u32),
}

impl FaultPlan {
    pub fn from_period(period: Option<u32>) -> Self {
        match period {
            Some(n) if n > 0 => FaultPlan::EveryNth(n),
            _ => FaultPlan::Never,
        }
    }

    fn fails(&self, quantum: u64) -> bool {
        match self {
            FaultPlan::Never => false,
            FaultPlan::EveryNth(n) => (quantum + 1) % u64::from(*n) == 0,
        }
    }
}

/// Supplies one quantum of one track from the timeline model.
struct TimelineSource<'a> {
    track: &'a Track,
    target: TimeRange,
    sample_rate: u32,
    channels: usize,
    fail: bool,
}

impl SourceAudioProvider for TimelineSource<'_> {
    fn source_audio(
        &mut self,
        frames: usize,
        buffer: &mut [f32],
    ) -> std::result::Result<SourceAudio, SourceRetrievalFailure> {
        if self.fail {
            return Err(SourceRetrievalFailure {
                status: INJECTED_FAILURE_STATUS,
            });
        }
        let span = self
            .track
            .source_span_for(self.target)
            .map_err(|_| SourceRetrievalFailure {
                status: MODEL_FAILURE_STATUS,
            })?;

        let samples = (frames * self.channels).min(buffer.len());
        buffer[..samples].fill(0.0);
        if let Some(span) = span {
            let offset = |time: MediaTime| {
                let secs = (time - self.target.start).as_secs_f64();
                let frame = (secs * f64::from(self.sample_rate)).round() as usize;
                (frame * self.channels).min(samples)
            };
            buffer[offset(span.target.start)..offset(span.target.end())].fill(CONTENT_LEVEL);
        }
        Ok(SourceAudio {
            frames,
            source_range: span.map(|span| span.source),
        })
    }
}

/// Drives every tap of an [`AudioMix`] across a composition.
#[derive(Debug, Clone)]
pub struct ReferenceHost {
    playback: PlaybackConfig,
    faults: FaultPlan,
}

impl ReferenceHost {
    pub fn new(playback: PlaybackConfig) -> Self {
        Self {
            playback,
            faults: FaultPlan::Never,
        }
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Timeline window rendered by quantum `index`. Boundaries are computed
    /// from frame counts so windows tile the timeline without drift.
    pub fn quantum_window(&self, index: u64) -> TimeRange {
        let frames = self.playback.quantum_frames as u64;
        let rate = self.playback.sample_rate;
        TimeRange::from_bounds(
            MediaTime::from_frames(index * frames, rate),
            MediaTime::from_frames((index + 1) * frames, rate),
        )
    }

    pub fn quanta_for(&self, duration: MediaTime) -> u64 {
        let frames = duration.to_frames(self.playback.sample_rate);
        frames.div_ceil(self.playback.quantum_frames as u64)
    }

    /// Plays `composition` through every tap in `mix`, one thread per track.
    pub fn run(
        &self,
        variant: Option<Variant>,
        composition: &Composition,
        mix: AudioMix,
    ) -> Result<PlaybackReport> {
        self.playback.validate()?;
        let duration = composition.duration();
        let quanta = self.quanta_for(duration);
        let format = TrackFormat {
            sample_rate: self.playback.sample_rate,
            channels: self.playback.channels,
            max_frames: self.playback.quantum_frames,
            expected_quanta: quanta as usize,
        };
        let probe = DefectProbe::new(composition);

        let mut sessions = Vec::new();
        for mut input in mix.into_inputs() {
            let Some(tap) = input.take_tap() else {
                tracing::debug!(track = %input.track(), "no tap attached, skipping");
                continue;
            };
            let track = composition.track(input.track())?;
            let session = TapSession::new(track.id(), tap);
            sessions.push((track, input.pitch_algorithm(), session));
        }

        tracing::info!(
            variant = variant.map(|variant| variant.name()),
            %duration,
            quanta,
            taps = sessions.len(),
            "starting reference playback"
        );

        let tracks = thread::scope(|scope| {
            let handles: Vec<_> = sessions
                .into_iter()
                .map(|(track, pitch, session)| {
                    scope.spawn(move || {
                        self.play_track(track, pitch, session, &format, quanta)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .map_err(|_| ScaledTapError::msg("tap thread panicked"))
                        .and_then(|report| report)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        for report in &tracks {
            if !report.is_clean() {
                tracing::warn!(
                    track = %report.track,
                    mismatches = report.mismatches.len(),
                    failures = report.retrieval_failures,
                    "tap observed unexpected source ranges"
                );
            }
        }

        Ok(PlaybackReport {
            variant,
            duration,
            sample_rate: self.playback.sample_rate,
            quantum_frames: self.playback.quantum_frames,
            predicted_dropout: probe.predicts_dropout(),
            tracks,
        })
    }

    fn play_track(
        &self,
        track: &Track,
        pitch: TimePitchAlgorithm,
        mut session: TapSession,
        format: &TrackFormat,
        quanta: u64,
    ) -> Result<TrackReport> {
        let channels = usize::from(format.channels);
        let mut buffer = vec![0.0f32; format.max_frames * channels];
        let mut records = Vec::with_capacity(quanta as usize);

        session.prepare(format)?;
        for quantum in 0..quanta {
            let target = self.quantum_window(quantum);
            let mut source = TimelineSource {
                track,
                target,
                sample_rate: format.sample_rate,
                channels,
                fail: self.faults.fails(quantum),
            };
            buffer.fill(0.0);

            let mut context =
                TapContext::new(quantum, format.max_frames, &mut buffer, &mut source);
            let outcome = session.process(&mut context)?;

            records.push(QuantumRecord {
                quantum,
                frames_requested: format.max_frames,
                target,
                expected: track.source_range_for(target)?,
                outcome,
                observed: outcome.source_range,
                retrieval_failed: source.fail,
                silent: buffer.iter().all(|sample| *sample == 0.0),
            });
        }
        session.unprepare()?;
        session.finalize()?;

        let tap = session.into_tap();
        Ok(TrackReport::from_records(track.id(), pitch, &records, tap.log()))
    }
}
