//! Reports built from what taps observed, and the track-arrangement
//! hypothesis the demo layouts are meant to confirm.

use serde::{Deserialize, Serialize};

use crate::{
    Composition, MediaKind, MediaTime, ProcessOutcome, Result, Slot, TapEvent, TapLog,
    TimePitchAlgorithm, TimeRange, TrackId, Variant,
};

/// One processed quantum as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantumRecord {
    pub quantum: u64,
    pub frames_requested: usize,
    /// Timeline window the quantum renders.
    pub target: TimeRange,
    /// Source range the timeline model says backs `target`.
    pub expected: Option<TimeRange>,
    pub outcome: ProcessOutcome,
    /// Source range the tap reported, from its log when it keeps one.
    pub observed: Option<TimeRange>,
    pub retrieval_failed: bool,
    /// True when the buffer left the tap holding only zeros.
    pub silent: bool,
}

/// A quantum whose reported source range differs from the model's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMismatch {
    pub quantum: u64,
    pub target: TimeRange,
    pub expected: Option<TimeRange>,
    pub observed: Option<TimeRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReport {
    pub track: TrackId,
    pub pitch_algorithm: TimePitchAlgorithm,
    pub quanta: usize,
    pub frames_requested: u64,
    pub frames_produced: u64,
    pub silent_quanta: usize,
    pub retrieval_failures: usize,
    /// Reported ranges that jump where the model's ranges are contiguous.
    pub discontinuities: usize,
    pub mismatches: Vec<RangeMismatch>,
    /// Events the tap dropped because its log was full.
    pub log_overflowed: usize,
}

impl TrackReport {
    /// Summarises one track's quanta. When the tap kept a log, its events
    /// decide which quanta failed and which ranges were observed; quanta the
    /// log does not mention keep what the host saw.
    pub fn from_records(
        track: TrackId,
        pitch_algorithm: TimePitchAlgorithm,
        records: &[QuantumRecord],
        log: Option<&TapLog>,
    ) -> Self {
        let mut records = records.to_vec();
        if let Some(log) = log {
            apply_log(&mut records, log);
        }

        let mut report = Self {
            track,
            pitch_algorithm,
            quanta: records.len(),
            frames_requested: 0,
            frames_produced: 0,
            silent_quanta: 0,
            retrieval_failures: 0,
            discontinuities: 0,
            mismatches: Vec::new(),
            log_overflowed: log.map_or(0, TapLog::overflowed),
        };

        for record in &records {
            report.frames_requested += record.frames_requested as u64;
            report.frames_produced += record.outcome.frames_produced as u64;
            if record.silent {
                report.silent_quanta += 1;
            }
            if record.retrieval_failed {
                report.retrieval_failures += 1;
                continue;
            }
            if record.observed != record.expected {
                report.mismatches.push(RangeMismatch {
                    quantum: record.quantum,
                    target: record.target,
                    expected: record.expected,
                    observed: record.observed,
                });
            }
        }

        report.discontinuities = records
            .windows(2)
            .filter(|pair| !pair[0].retrieval_failed && !pair[1].retrieval_failed)
            .filter(|pair| {
                contiguous(pair[0].expected, pair[1].expected)
                    && !contiguous(pair[0].observed, pair[1].observed)
            })
            .count();

        report
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.discontinuities == 0 && self.retrieval_failures == 0
    }
}

fn apply_log(records: &mut [QuantumRecord], log: &TapLog) {
    for event in log.events() {
        let (quantum, failed, observed) = match *event {
            TapEvent::Observed {
                quantum,
                source_range,
                ..
            } => (quantum, false, source_range),
            TapEvent::RetrievalFailed { quantum, .. } => (quantum, true, None),
        };
        if let Some(record) = records.iter_mut().find(|record| record.quantum == quantum) {
            record.retrieval_failed = failed;
            record.observed = observed;
        }
    }
}

fn contiguous(previous: Option<TimeRange>, next: Option<TimeRange>) -> bool {
    match (previous, next) {
        (Some(previous), Some(next)) => previous.end() == next.start,
        _ => false,
    }
}

/// Everything observed during one reference playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub variant: Option<Variant>,
    pub duration: MediaTime,
    pub sample_rate: u32,
    pub quantum_frames: usize,
    pub predicted_dropout: bool,
    pub tracks: Vec<TrackReport>,
}

impl PlaybackReport {
    pub fn is_clean(&self) -> bool {
        self.tracks.iter().all(TrackReport::is_clean)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Where one audio track stands against the defect hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackProbe {
    pub track: TrackId,
    /// Position among the composition's audio tracks, from zero.
    pub audio_index: usize,
    /// A scaled segment sits somewhere other than the track's first slot.
    pub scaled_after_first_slot: bool,
}

impl TrackProbe {
    /// Not the first audio track, and scaled content that does not lead.
    pub fn at_risk(&self) -> bool {
        self.audio_index > 0 && self.scaled_after_first_slot
    }
}

/// Evaluates the arrangement hypothesis over every audio track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectProbe {
    pub tracks: Vec<TrackProbe>,
}

impl DefectProbe {
    pub fn new(composition: &Composition) -> Self {
        let tracks = composition
            .all_tracks()
            .iter()
            .filter(|track| track.kind() == MediaKind::Audio)
            .enumerate()
            .map(|(audio_index, track)| TrackProbe {
                track: track.id(),
                audio_index,
                scaled_after_first_slot: track.slots().enumerate().any(|(index, slot)| {
                    index > 0 && matches!(slot, Slot::Segment(segment) if segment.is_scaled())
                }),
            })
            .collect();
        Self { tracks }
    }

    pub fn predicts_dropout(&self) -> bool {
        self.tracks.iter().any(TrackProbe::at_risk)
    }

    pub fn at_risk_tracks(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.tracks
            .iter()
            .filter(|probe| probe.at_risk())
            .map(|probe| probe.track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GapPolicy, SourceMedia};

    fn media() -> SourceMedia {
        SourceMedia::audio_video("video.mp4", MediaTime::from_secs(8), MediaTime::from_secs(8))
    }

    fn record(
        quantum: u64,
        expected: Option<TimeRange>,
        observed: Option<TimeRange>,
    ) -> QuantumRecord {
        QuantumRecord {
            quantum,
            frames_requested: 100,
            target: TimeRange::from_secs(quantum as i64, 1),
            expected,
            outcome: ProcessOutcome {
                frames_produced: 100,
                source_range: observed,
            },
            observed,
            retrieval_failed: false,
            silent: observed.is_none(),
        }
    }

    fn report(records: &[QuantumRecord], log: Option<&TapLog>) -> TrackReport {
        TrackReport::from_records(TrackId::new(2), TimePitchAlgorithm::Varispeed, records, log)
    }

    fn secs(start: i64) -> Option<TimeRange> {
        Some(TimeRange::from_secs(start, 1))
    }

    #[test]
    fn hypothesis_flags_only_the_two_track_layout() {
        for variant in Variant::ALL {
            let composition = variant.build(&media(), GapPolicy::Reject).unwrap();
            let probe = DefectProbe::new(&composition);
            assert_eq!(
                probe.predicts_dropout(),
                variant == Variant::TwoAudioTracks,
                "{variant}"
            );
        }
    }

    #[test]
    fn hypothesis_names_the_second_audio_track() {
        let composition = Variant::TwoAudioTracks
            .build(&media(), GapPolicy::Reject)
            .unwrap();
        let probe = DefectProbe::new(&composition);

        let second = composition.tracks(MediaKind::Audio).nth(1).unwrap();
        assert_eq!(probe.at_risk_tracks().collect::<Vec<_>>(), vec![second]);
    }

    #[test]
    fn matching_ranges_make_a_clean_report() {
        let records = [
            record(0, None, None),
            record(1, secs(3), secs(3)),
            record(2, secs(4), secs(4)),
        ];
        let report = report(&records, None);

        assert!(report.is_clean());
        assert_eq!(report.quanta, 3);
        assert_eq!(report.silent_quanta, 1);
        assert_eq!(report.frames_produced, 300);
    }

    #[test]
    fn null_and_shifted_ranges_are_mismatches() {
        let records = [
            record(0, secs(3), secs(3)),
            record(1, secs(4), None),
            record(2, secs(5), secs(1)),
        ];
        let report = report(&records, None);

        assert!(!report.is_clean());
        assert_eq!(report.mismatches.len(), 2);
        assert_eq!(report.mismatches[0].observed, None);
        assert_eq!(report.discontinuities, 2);
    }

    #[test]
    fn retrieval_failures_are_counted_separately() {
        let mut failed = record(1, secs(4), None);
        failed.retrieval_failed = true;
        failed.outcome = ProcessOutcome::SILENT;
        let records = [record(0, secs(3), secs(3)), failed];
        let report = report(&records, None);

        assert!(report.mismatches.is_empty());
        assert_eq!(report.retrieval_failures, 1);
        assert_eq!(report.frames_produced, 100);
        assert!(!report.is_clean());
    }

    #[test]
    fn tap_log_overrides_what_the_host_saw() {
        let mut host_failed = record(1, secs(4), secs(4));
        host_failed.retrieval_failed = true;
        let records = [record(0, secs(3), secs(3)), host_failed, record(2, secs(5), secs(5))];

        let mut log = TapLog::with_capacity(2);
        log.record(TapEvent::RetrievalFailed {
            quantum: 0,
            status: -1,
        });
        log.record(TapEvent::Observed {
            quantum: 1,
            frames: 100,
            source_range: secs(4),
        });
        log.record(TapEvent::Observed {
            quantum: 2,
            frames: 100,
            source_range: None,
        });
        let report = report(&records, Some(&log));

        assert_eq!(report.retrieval_failures, 1);
        assert_eq!(report.log_overflowed, 1);
        assert!(report.mismatches.is_empty());
    }

    #[test]
    fn report_serializes_to_json() {
        let report = PlaybackReport {
            variant: Some(Variant::OneAudioTrack),
            duration: MediaTime::from_secs(6),
            sample_rate: 48_000,
            quantum_frames: 1024,
            predicted_dropout: false,
            tracks: Vec::new(),
        };
        let json = report.to_json().unwrap();
        assert!(json.contains("\"variant\": \"one-audio-track\""));
    }
}
