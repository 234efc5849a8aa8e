//! Core library for the scaled-segment audio tap probe.
//!
//! The crate models a multi-track composition built from one source asset,
//! the fixed layouts used to reproduce a tap defect on time-scaled segments,
//! and the tap contract a playback engine drives on each audio track. A
//! reference host plays compositions offline so taps can be checked against
//! the source ranges the timeline model predicts.

pub mod composition;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod host;
pub mod layout;
pub mod mix;
pub mod source;
pub mod tap;
pub mod time;
pub mod track;
pub mod variant;

pub use composition::Composition;
pub use config::{AppConfig, PlaybackConfig, ProbeConfig, SourceConfig};
pub use diagnostics::{
    DefectProbe, PlaybackReport, QuantumRecord, RangeMismatch, TrackProbe, TrackReport,
};
pub use error::{Result, ScaledTapError, SourceRetrievalFailure};
pub use host::{FaultPlan, ReferenceHost};
pub use layout::Layout;
pub use mix::{AudioMix, MixInputParameters, TimePitchAlgorithm};
pub use source::{MediaKind, SourceMedia, SourceTrack, SourceTrackId};
pub use tap::{
    AudioTap, ProcessOutcome, SourceAudio, SourceAudioProvider, SourceRangeTap, TapContext,
    TapEvent, TapLog, TapSession, TapState, TrackFormat,
};
pub use time::{MediaTime, TimeMapping, TimeRange};
pub use track::{
    GapPolicy, InsertAt, Segment, SegmentSource, Slot, Slots, SourceSpan, Track, TrackId,
};
pub use variant::Variant;
