use crate::{MediaKind, SourceTrackId, TimeRange, TrackId, Variant};

/// Result alias that carries the custom [`ScaledTapError`] type.
pub type Result<T> = std::result::Result<T, ScaledTapError>;

/// Common error type for the core crate.
///
/// Construction-time variants always name the track (and segment index where
/// one exists) so a malformed timeline can be traced back to the call that
/// produced it.
#[derive(Debug, thiserror::Error)]
pub enum ScaledTapError {
    /// A source range or placement window that is empty, negative or out of
    /// the referenced source track's bounds.
    #[error("invalid range {range} on track {track}: {reason}")]
    InvalidRange {
        track: TrackId,
        range: TimeRange,
        reason: &'static str,
    },
    /// A rescale window that no segment on the track backs.
    #[error("rescale window {window} on track {track} is not backed by any segment")]
    OutOfRange { track: TrackId, window: TimeRange },
    /// A mapping where exactly one side is empty, so no rate exists.
    #[error("degenerate mapping {from} -> {to}")]
    DivideByZero { from: TimeRange, to: TimeRange },
    /// Attaches the offending segment to an error raised while checking it.
    #[error("segment {segment} on track {track}: {source}")]
    Segment {
        track: TrackId,
        segment: usize,
        #[source]
        source: Box<ScaledTapError>,
    },
    #[error("unknown source track {0}")]
    UnknownSourceTrack(SourceTrackId),
    #[error("unknown composition track {0}")]
    UnknownTrack(TrackId),
    #[error("track {track} holds {expected} media but source track is {found}")]
    MediaKindMismatch {
        track: TrackId,
        expected: MediaKind,
        found: MediaKind,
    },
    /// A host drove a tap through its lifecycle out of order.
    #[error("tap on track {track} cannot move from {from} to {to}")]
    InvalidTransition {
        track: TrackId,
        from: &'static str,
        to: &'static str,
    },
    /// Wraps a construction failure with the layout that was being built.
    #[error("failed to build {variant}: {source}")]
    Build {
        variant: Variant,
        #[source]
        source: Box<ScaledTapError>,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Free-form message for failures outside the timeline model.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl ScaledTapError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid_range(track: TrackId, range: TimeRange, reason: &'static str) -> Self {
        Self::InvalidRange {
            track,
            range,
            reason,
        }
    }

    /// Returns the track a construction-time error was raised for, if any.
    pub fn track(&self) -> Option<TrackId> {
        match self {
            Self::InvalidRange { track, .. }
            | Self::OutOfRange { track, .. }
            | Self::Segment { track, .. }
            | Self::MediaKindMismatch { track, .. }
            | Self::InvalidTransition { track, .. } => Some(*track),
            Self::UnknownTrack(track) => Some(*track),
            Self::Build { source, .. } => source.track(),
            _ => None,
        }
    }
}

/// Raised by a host when it cannot supply the audio backing a tap's quantum.
///
/// Taps recover from this locally; it never crosses back into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("source audio retrieval failed with status {status}")]
pub struct SourceRetrievalFailure {
    pub status: i32,
}
