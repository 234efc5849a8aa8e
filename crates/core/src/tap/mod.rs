//! The audio tap contract: callbacks a playback engine invokes on every audio
//! track while rendering, plus the diagnostic tap that records which source
//! range backed each quantum.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, ScaledTapError, SourceRetrievalFailure, TimeRange, TrackId};

/// Stream format handed to a tap before playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Largest `frames_requested` the host will ever pass.
    pub max_frames: usize,
    /// Number of quanta the host expects to render; taps may size logs with it.
    pub expected_quanta: usize,
}

/// Audio the host produced for one quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceAudio {
    pub frames: usize,
    /// Source time backing the frames; `None` when the host has none (silence).
    pub source_range: Option<TimeRange>,
}

/// Host side of the tap seam: fills a buffer with the audio about to be
/// rendered and reports where in the source it came from.
pub trait SourceAudioProvider {
    fn source_audio(
        &mut self,
        frames: usize,
        buffer: &mut [f32],
    ) -> std::result::Result<SourceAudio, SourceRetrievalFailure>;
}

/// Everything a tap may touch during one `process` call. Built by the host
/// per invocation and never retained.
pub struct TapContext<'a> {
    frames_requested: usize,
    quantum: u64,
    buffer: &'a mut [f32],
    provider: &'a mut dyn SourceAudioProvider,
}

impl<'a> TapContext<'a> {
    pub fn new(
        quantum: u64,
        frames_requested: usize,
        buffer: &'a mut [f32],
        provider: &'a mut dyn SourceAudioProvider,
    ) -> Self {
        Self {
            frames_requested,
            quantum,
            buffer,
            provider,
        }
    }

    pub fn frames_requested(&self) -> usize {
        self.frames_requested
    }

    /// Index of this call within the session, starting at zero.
    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    pub fn buffer(&self) -> &[f32] {
        self.buffer
    }

    /// Asks the host for the source audio of this quantum, written in place.
    pub fn source_audio(&mut self) -> std::result::Result<SourceAudio, SourceRetrievalFailure> {
        self.provider
            .source_audio(self.frames_requested, self.buffer)
    }

    pub fn silence(&mut self) {
        self.buffer.fill(0.0);
    }
}

impl fmt::Debug for TapContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapContext")
            .field("frames_requested", &self.frames_requested)
            .field("quantum", &self.quantum)
            .field("buffer", &self.buffer.len())
            .finish()
    }
}

/// What a tap hands back to the engine for one quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub frames_produced: usize,
    pub source_range: Option<TimeRange>,
}

impl ProcessOutcome {
    pub const SILENT: Self = Self {
        frames_produced: 0,
        source_range: None,
    };
}

/// Callbacks a playback engine drives on one audio track.
///
/// The engine never overlaps calls on the same tap. `process` runs on the
/// render thread and must not block or allocate.
pub trait AudioTap: Send {
    fn prepare(&mut self, _format: &TrackFormat) {}

    fn process(&mut self, context: &mut TapContext<'_>) -> ProcessOutcome;

    fn unprepare(&mut self) {}

    fn finalize(&mut self) {}

    /// What the tap recorded, for taps that keep a log.
    fn log(&self) -> Option<&TapLog> {
        None
    }
}

/// Lifecycle of a tap over one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapState {
    Created,
    Prepared,
    Processing,
    Unprepared,
    Finalized,
}

impl TapState {
    pub fn name(&self) -> &'static str {
        match self {
            TapState::Created => "created",
            TapState::Prepared => "prepared",
            TapState::Processing => "processing",
            TapState::Unprepared => "unprepared",
            TapState::Finalized => "finalized",
        }
    }

    pub fn can_move_to(&self, next: TapState) -> bool {
        use TapState::*;

        matches!(
            (self, next),
            (Created, Prepared)
                | (Created, Finalized)
                | (Prepared, Processing)
                | (Prepared, Unprepared)
                | (Processing, Processing)
                | (Processing, Unprepared)
                | (Unprepared, Prepared)
                | (Unprepared, Finalized)
        )
    }
}

impl fmt::Display for TapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-side handle that keeps a tap's callbacks in lifecycle order.
pub struct TapSession {
    track: TrackId,
    state: TapState,
    tap: Box<dyn AudioTap>,
}

impl TapSession {
    pub fn new(track: TrackId, tap: Box<dyn AudioTap>) -> Self {
        Self {
            track,
            state: TapState::Created,
            tap,
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn tap(&self) -> &dyn AudioTap {
        self.tap.as_ref()
    }

    /// Hands the tap back once the engine is done with it.
    pub fn into_tap(self) -> Box<dyn AudioTap> {
        self.tap
    }

    pub fn prepare(&mut self, format: &TrackFormat) -> Result<()> {
        self.advance(TapState::Prepared)?;
        self.tap.prepare(format);
        Ok(())
    }

    pub fn process(&mut self, context: &mut TapContext<'_>) -> Result<ProcessOutcome> {
        self.advance(TapState::Processing)?;
        Ok(self.tap.process(context))
    }

    pub fn unprepare(&mut self) -> Result<()> {
        self.advance(TapState::Unprepared)?;
        self.tap.unprepare();
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.advance(TapState::Finalized)?;
        self.tap.finalize();
        Ok(())
    }

    fn advance(&mut self, next: TapState) -> Result<()> {
        if !self.state.can_move_to(next) {
            return Err(ScaledTapError::InvalidTransition {
                track: self.track,
                from: self.state.name(),
                to: next.name(),
            });
        }
        self.state = next;
        Ok(())
    }
}

impl fmt::Debug for TapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapSession")
            .field("track", &self.track)
            .field("state", &self.state)
            .finish()
    }
}

/// One entry recorded by [`SourceRangeTap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TapEvent {
    Observed {
        quantum: u64,
        frames: usize,
        source_range: Option<TimeRange>,
    },
    RetrievalFailed {
        quantum: u64,
        status: i32,
    },
}

/// Fixed-capacity record of what a tap saw. Capacity is reserved in
/// `prepare`; entries past it are counted, not stored.
#[derive(Debug, Clone, Default)]
pub struct TapLog {
    events: Vec<TapEvent>,
    limit: usize,
    overflowed: usize,
}

impl TapLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut log = Self::default();
        log.reserve(capacity);
        log
    }

    /// Clears the log and makes room for `capacity` events.
    pub fn reserve(&mut self, capacity: usize) {
        self.events.clear();
        self.events.reserve(capacity);
        self.limit = capacity;
        self.overflowed = 0;
    }

    /// Stores `event`, or counts it once the log is full. Never allocates.
    pub fn record(&mut self, event: TapEvent) {
        if self.events.len() < self.limit {
            self.events.push(event);
        } else {
            self.overflowed += 1;
        }
    }

    pub fn events(&self) -> &[TapEvent] {
        &self.events
    }

    pub fn overflowed(&self) -> usize {
        self.overflowed
    }

    pub fn failures(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, TapEvent::RetrievalFailed { .. }))
            .count()
    }
}

/// Pass-through tap that fetches the source audio, leaves it untouched and
/// reports the source range the host says backs it.
#[derive(Debug)]
pub struct SourceRangeTap {
    track: TrackId,
    state: TapState,
    log: TapLog,
}

impl SourceRangeTap {
    pub fn new(track: TrackId) -> Self {
        Self {
            track,
            state: TapState::Created,
            log: TapLog::default(),
        }
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn log(&self) -> &TapLog {
        &self.log
    }
}

impl AudioTap for SourceRangeTap {
    fn prepare(&mut self, format: &TrackFormat) {
        self.log.reserve(format.expected_quanta);
        self.state = TapState::Prepared;
    }

    fn process(&mut self, context: &mut TapContext<'_>) -> ProcessOutcome {
        self.state = TapState::Processing;
        let quantum = context.quantum();

        match context.source_audio() {
            Ok(audio) => {
                self.log.record(TapEvent::Observed {
                    quantum,
                    frames: audio.frames,
                    source_range: audio.source_range,
                });
                ProcessOutcome {
                    frames_produced: audio.frames,
                    source_range: audio.source_range,
                }
            }
            Err(failure) => {
                context.silence();
                self.log.record(TapEvent::RetrievalFailed {
                    quantum,
                    status: failure.status,
                });
                ProcessOutcome::SILENT
            }
        }
    }

    fn unprepare(&mut self) {
        self.state = TapState::Unprepared;
    }

    fn finalize(&mut self) {
        self.state = TapState::Finalized;
    }

    fn log(&self) -> Option<&TapLog> {
        Some(&self.log)
    }
}
