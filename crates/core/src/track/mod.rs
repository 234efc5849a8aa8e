//! A single composition track: an ordered run of segments on one timeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    MediaKind, MediaTime, Result, ScaledTapError, SourceMedia, SourceTrackId, TimeMapping,
    TimeRange,
};

/// Persistent identifier of a track inside its composition. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u32);

impl TrackId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where [`Track::insert`] places new content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Time(MediaTime),
    /// Immediately after the end of the last segment.
    Append,
}

impl From<MediaTime> for InsertAt {
    /// Negative times are the "unspecified" sentinel and resolve to
    /// [`InsertAt::Append`].
    fn from(value: MediaTime) -> Self {
        if value.is_negative() {
            InsertAt::Append
        } else {
            InsertAt::Time(value)
        }
    }
}

/// What [`Track::rescale`] does with a window that no segment backs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Fail with [`ScaledTapError::OutOfRange`].
    #[default]
    Reject,
    /// Insert an empty segment spanning the window, then scale it.
    Materialize,
}

/// The media a segment plays: a range of one shared source track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSource {
    pub track: SourceTrackId,
    pub range: TimeRange,
}

/// A placed piece of content. Segments without a source are explicit empty
/// regions and play as silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    source: Option<SegmentSource>,
    placement: TimeRange,
}

impl Segment {
    fn empty(placement: TimeRange) -> Self {
        Self {
            source: None,
            placement,
        }
    }

    pub fn source(&self) -> Option<&SegmentSource> {
        self.source.as_ref()
    }

    pub fn source_track(&self) -> Option<SourceTrackId> {
        self.source.map(|source| source.track)
    }

    /// Source range backing the segment; empty at zero for empty segments.
    pub fn source_range(&self) -> TimeRange {
        self.source
            .map(|source| source.range)
            .unwrap_or(TimeRange::ZERO)
    }

    pub fn placement(&self) -> TimeRange {
        self.placement
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none()
    }

    pub fn mapping(&self) -> TimeMapping {
        TimeMapping::new(self.source_range(), self.placement)
    }

    /// Playback speed applied to the source; `1.0` means unscaled.
    pub fn rate(&self) -> Result<f64> {
        self.mapping().rate()
    }

    pub fn scale_factor(&self) -> Result<f64> {
        self.mapping().scale_factor()
    }

    /// True for content played at anything other than its natural speed.
    pub fn is_scaled(&self) -> bool {
        !self.is_empty() && !self.mapping().is_identity_rate()
    }

    fn shifted(&self, delta: MediaTime) -> Self {
        Self {
            source: self.source,
            placement: self.placement.shifted(delta),
        }
    }

    /// Cuts the segment at a timeline point strictly inside its placement.
    /// The source is divided in proportion to the current rate.
    fn split_at(&self, at: MediaTime) -> Result<(Segment, Segment)> {
        debug_assert!(at > self.placement.start && at < self.placement.end());
        let left_placement = TimeRange::from_bounds(self.placement.start, at);
        let right_placement = TimeRange::from_bounds(at, self.placement.end());

        let (left_source, right_source) = match self.source {
            None => (None, None),
            Some(source) => {
                let cut = self.mapping().source_time_at(at)?;
                (
                    Some(SegmentSource {
                        track: source.track,
                        range: TimeRange::from_bounds(source.range.start, cut),
                    }),
                    Some(SegmentSource {
                        track: source.track,
                        range: TimeRange::from_bounds(cut, source.range.end()),
                    }),
                )
            }
        };

        Ok((
            Segment {
                source: left_source,
                placement: left_placement,
            },
            Segment {
                source: right_source,
                placement: right_placement,
            },
        ))
    }
}

/// A stretch of timeline and the source content playing over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub track: SourceTrackId,
    pub target: TimeRange,
    pub source: TimeRange,
}

impl SourceSpan {
    /// True when `next` picks up exactly where this span ends, on both
    /// timelines and from the same source track.
    fn continues_into(&self, next: &SourceSpan) -> bool {
        self.track == next.track
            && self.target.end() == next.target.start
            && self.source.end() == next.source.start
    }

    fn extend(&mut self, next: &SourceSpan) {
        self.target = TimeRange::from_bounds(self.target.start, next.target.end());
        self.source = TimeRange::from_bounds(self.source.start, next.source.end());
    }
}

/// One step along a track's timeline from time zero: either a segment or the
/// implicit gap before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    Gap(TimeRange),
    Segment(&'a Segment),
}

impl Slot<'_> {
    pub fn range(&self) -> TimeRange {
        match self {
            Slot::Gap(range) => *range,
            Slot::Segment(segment) => segment.placement(),
        }
    }

    /// True when the slot produces silence: an implicit gap or empty segment.
    pub fn is_silent(&self) -> bool {
        match self {
            Slot::Gap(_) => true,
            Slot::Segment(segment) => segment.is_empty(),
        }
    }
}

/// Iterator returned by [`Track::slots`].
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    segments: std::slice::Iter<'a, Segment>,
    cursor: MediaTime,
    pending: Option<&'a Segment>,
}

impl<'a> Iterator for Slots<'a> {
    type Item = Slot<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let segment = match self.pending.take() {
            Some(segment) => segment,
            None => self.segments.next()?,
        };

        let placement = segment.placement();
        if placement.start > self.cursor {
            let gap = TimeRange::from_bounds(self.cursor, placement.start);
            self.cursor = placement.start;
            self.pending = Some(segment);
            return Some(Slot::Gap(gap));
        }

        self.cursor = placement.end();
        Some(Slot::Segment(segment))
    }
}

/// Ordered, non-overlapping segments of one media kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    id: TrackId,
    kind: MediaKind,
    gap_policy: GapPolicy,
    segments: Vec<Segment>,
}

impl Track {
    pub fn new(id: TrackId, kind: MediaKind) -> Self {
        Self {
            id,
            kind,
            gap_policy: GapPolicy::default(),
            segments: Vec::new(),
        }
    }

    pub fn with_gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn gap_policy(&self) -> GapPolicy {
        self.gap_policy
    }

    pub fn set_gap_policy(&mut self, policy: GapPolicy) {
        self.gap_policy = policy;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments interleaved with the implicit gaps between them, from zero.
    pub fn slots(&self) -> Slots<'_> {
        Slots {
            segments: self.segments.iter(),
            cursor: MediaTime::ZERO,
            pending: None,
        }
    }

    /// Covering range of all segments; empty at zero for an empty track.
    pub fn extent(&self) -> TimeRange {
        match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => {
                TimeRange::from_bounds(first.placement.start, last.placement.end())
            }
            _ => TimeRange::ZERO,
        }
    }

    /// Segment whose placement contains `time`.
    pub fn segment_at(&self, time: MediaTime) -> Option<&Segment> {
        let index = self
            .segments
            .partition_point(|segment| segment.placement.end() <= time);
        self.segments
            .get(index)
            .filter(|segment| segment.placement.contains(time))
    }

    /// Places `source_range` of `from` on this track.
    ///
    /// Inserting inside existing content splits the segment there and pushes
    /// everything at or after the insertion point later by the inserted
    /// length.
    pub fn insert(
        &mut self,
        media: &SourceMedia,
        source_range: TimeRange,
        from: SourceTrackId,
        at: impl Into<InsertAt>,
    ) -> Result<&Segment> {
        let source_track = media.track(from)?;
        if source_track.kind != self.kind {
            return Err(ScaledTapError::MediaKindMismatch {
                track: self.id,
                expected: self.kind,
                found: source_track.kind,
            });
        }
        if !source_range.is_valid() || !source_range.length.is_positive() {
            return Err(ScaledTapError::invalid_range(
                self.id,
                source_range,
                "source range must have a positive length",
            ));
        }
        if source_range.end() > source_track.duration {
            return Err(ScaledTapError::invalid_range(
                self.id,
                source_range,
                "source range exceeds the source track",
            ));
        }

        let position = match at.into() {
            InsertAt::Time(time) => time,
            InsertAt::Append => self.extent().end(),
        };
        if position.is_negative() {
            return Err(ScaledTapError::invalid_range(
                self.id,
                TimeRange::new(position, source_range.length),
                "insertion point must not be negative",
            ));
        }
        let length = source_range.length;

        let mut segments = Vec::with_capacity(self.segments.len() + 2);
        for segment in &self.segments {
            let placement = segment.placement;
            if placement.end() <= position {
                segments.push(segment.clone());
            } else if placement.start >= position {
                segments.push(segment.shifted(length));
            } else {
                let (left, right) = segment.split_at(position)?;
                segments.push(left);
                segments.push(right.shifted(length));
            }
        }

        let index = segments.partition_point(|segment| segment.placement.start < position);
        segments.insert(
            index,
            Segment {
                source: Some(SegmentSource {
                    track: from,
                    range: source_range,
                }),
                placement: TimeRange::new(position, length),
            },
        );
        self.segments = segments;

        tracing::debug!(
            track = %self.id,
            source = %source_range,
            placement = %self.segments[index].placement,
            "inserted segment"
        );
        Ok(&self.segments[index])
    }

    /// Stretches or squeezes everything inside `window` so it occupies
    /// `to_length`, moving later content by `to_length - window.length`.
    pub fn rescale(&mut self, window: TimeRange, to_length: MediaTime) -> Result<()> {
        if !window.is_valid() || !window.length.is_positive() {
            return Err(ScaledTapError::invalid_range(
                self.id,
                window,
                "rescale window must have a positive length",
            ));
        }
        if !to_length.is_positive() {
            return Err(ScaledTapError::invalid_range(
                self.id,
                TimeRange::new(window.start, to_length),
                "rescaled length must be positive",
            ));
        }

        if !self
            .segments
            .iter()
            .any(|segment| segment.placement.intersects(&window))
        {
            match self.gap_policy {
                GapPolicy::Reject => {
                    return Err(ScaledTapError::OutOfRange {
                        track: self.id,
                        window,
                    });
                }
                GapPolicy::Materialize => {
                    let index = self
                        .segments
                        .partition_point(|segment| segment.placement.start < window.start);
                    self.segments.insert(index, Segment::empty(window));
                }
            }
        }

        let mut pieces = Vec::with_capacity(self.segments.len() + 2);
        for segment in &self.segments {
            let mut rest = segment.clone();
            for edge in [window.start, window.end()] {
                if edge > rest.placement.start && edge < rest.placement.end() {
                    let (left, right) = rest.split_at(edge)?;
                    pieces.push(left);
                    rest = right;
                }
            }
            pieces.push(rest);
        }

        let delta = to_length - window.length;
        let stretch = |time: MediaTime| {
            window.start + (time - window.start).mul_div(to_length, window.length)
        };
        for segment in &mut pieces {
            let placement = segment.placement;
            if placement.end() <= window.start {
                continue;
            }
            if placement.start >= window.end() {
                segment.placement = placement.shifted(delta);
            } else {
                segment.placement =
                    TimeRange::from_bounds(stretch(placement.start), stretch(placement.end()));
            }
        }
        self.segments = pieces;

        tracing::debug!(track = %self.id, %window, to = %to_length, "rescaled window");
        Ok(())
    }

    /// Source range backing `target`, or `None` when the whole window is
    /// silent. See [`Track::source_span_for`].
    pub fn source_range_for(&self, target: TimeRange) -> Result<Option<TimeRange>> {
        Ok(self.source_span_for(target)?.map(|span| span.source))
    }

    /// Backed part of `target`: the first sourced segment overlapping the
    /// window, extended through following segments that continue it with no
    /// break on either timeline.
    pub fn source_span_for(&self, target: TimeRange) -> Result<Option<SourceSpan>> {
        let first = self
            .segments
            .partition_point(|segment| segment.placement.end() <= target.start);
        let mut span: Option<SourceSpan> = None;

        for segment in &self.segments[first..] {
            if segment.placement.start >= target.end() {
                break;
            }
            let (Some(source), Some(clipped)) =
                (segment.source, target.intersection(&segment.placement))
            else {
                if span.is_some() {
                    break;
                }
                continue;
            };

            let mapping = segment.mapping();
            let piece = SourceSpan {
                track: source.track,
                target: clipped,
                source: TimeRange::from_bounds(
                    mapping.source_time_at(clipped.start)?,
                    mapping.source_time_at(clipped.end())?,
                ),
            };
            match span.as_mut() {
                None => span = Some(piece),
                Some(current) if current.continues_into(&piece) => current.extend(&piece),
                Some(_) => break,
            }
        }
        Ok(span)
    }

    /// Checks ordering, overlap and every segment's mapping. Errors name the
    /// offending segment.
    pub fn validate(&self) -> Result<()> {
        let mut previous_end = MediaTime::ZERO;
        for (index, segment) in self.segments.iter().enumerate() {
            let placement = segment.placement;
            let check = if !placement.is_valid() {
                Err(ScaledTapError::invalid_range(
                    self.id,
                    placement,
                    "placement is invalid",
                ))
            } else if placement.start < previous_end {
                Err(ScaledTapError::invalid_range(
                    self.id,
                    placement,
                    "placement overlaps the previous segment",
                ))
            } else if segment.is_empty() {
                Ok(())
            } else {
                segment
                    .scale_factor()
                    .and_then(|_| segment.rate())
                    .map(|_| ())
            };

            check.map_err(|source| ScaledTapError::Segment {
                track: self.id,
                segment: index,
                source: Box::new(source),
            })?;
            previous_end = placement.end();
        }
        Ok(())
    }
}
