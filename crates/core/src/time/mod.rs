//! Time values used throughout the timeline model.
//!
//! All arithmetic is integral nanoseconds so that the demo layouts reproduce
//! exactly on every run; floating point only appears when a ratio is reported.

use std::{
    fmt,
    ops::{Add, Neg, Sub},
};

use serde::{Deserialize, Serialize};

use crate::{Result, ScaledTapError};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A signed point or span on a timeline, in nanoseconds.
///
/// Negative values are representable so that [`TimeRange::INVALID`] can be
/// distinguished from an empty range at time zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTime(i64);

impl MediaTime {
    pub const ZERO: Self = Self(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * NANOS_PER_SEC)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Converts fractional seconds, rounding to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    /// Duration of `frames` audio frames at `sample_rate`, rounded down.
    pub fn from_frames(frames: u64, sample_rate: u32) -> Self {
        let nanos = i128::from(frames) * i128::from(NANOS_PER_SEC) / i128::from(sample_rate.max(1));
        Self(nanos as i64)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Number of whole frames at `sample_rate` covered by this span.
    pub fn to_frames(self, sample_rate: u32) -> u64 {
        if self.0 <= 0 {
            return 0;
        }
        (i128::from(self.0) * i128::from(sample_rate) / i128::from(NANOS_PER_SEC)) as u64
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Computes `self * num / den` with a wide intermediate, rounding to
    /// nearest. `den` must be non-zero.
    pub(crate) fn mul_div(self, num: Self, den: Self) -> Self {
        debug_assert!(den.0 != 0, "mul_div by zero");
        let product = i128::from(self.0) * i128::from(num.0);
        let den = i128::from(den.0);
        let half = den.abs() / 2;
        let rounded = if (product >= 0) == (den > 0) {
            (product.abs() + half) / den.abs()
        } else {
            -((product.abs() + half) / den.abs())
        };
        Self(rounded as i64)
    }
}

impl Add for MediaTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for MediaTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for MediaTime {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % NANOS_PER_SEC == 0 {
            write!(f, "{}s", self.0 / NANOS_PER_SEC)
        } else {
            write!(f, "{:.3}s", self.as_secs_f64())
        }
    }
}

/// A half-open interval `[start, start + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: MediaTime,
    pub length: MediaTime,
}

impl TimeRange {
    /// "Unspecified" range. As an insertion position it means "after the
    /// existing content".
    pub const INVALID: Self = Self {
        start: MediaTime(-1),
        length: MediaTime(-1),
    };

    pub const ZERO: Self = Self {
        start: MediaTime::ZERO,
        length: MediaTime::ZERO,
    };

    pub const fn new(start: MediaTime, length: MediaTime) -> Self {
        Self { start, length }
    }

    pub const fn from_secs(start: i64, length: i64) -> Self {
        Self::new(MediaTime::from_secs(start), MediaTime::from_secs(length))
    }

    /// Builds the range covering `[start, end)`.
    pub fn from_bounds(start: MediaTime, end: MediaTime) -> Self {
        Self::new(start, end - start)
    }

    pub const fn is_valid(&self) -> bool {
        !self.start.is_negative() && !self.length.is_negative()
    }

    pub const fn is_empty(&self) -> bool {
        self.length.0 == 0
    }

    pub fn end(&self) -> MediaTime {
        self.start + self.length
    }

    pub fn contains(&self, time: MediaTime) -> bool {
        time >= self.start && time < self.end()
    }

    /// True when the two ranges share a non-empty span.
    pub fn intersects(&self, other: &TimeRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        (start < end).then(|| TimeRange::from_bounds(start, end))
    }

    /// Smallest range covering both inputs.
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange::from_bounds(self.start.min(other.start), self.end().max(other.end()))
    }

    pub fn shifted(&self, delta: MediaTime) -> TimeRange {
        TimeRange::new(self.start + delta, self.length)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "[{}, {})", self.start, self.end())
        } else {
            f.write_str("[invalid]")
        }
    }
}

/// Source content rendered into a (possibly longer or shorter) target window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMapping {
    pub source: TimeRange,
    pub target: TimeRange,
}

impl TimeMapping {
    pub const fn new(source: TimeRange, target: TimeRange) -> Self {
        Self { source, target }
    }

    /// `target.length / source.length`. An empty-onto-empty mapping is a
    /// placeholder and reports `1.0`.
    pub fn scale_factor(&self) -> Result<f64> {
        self.ratio(self.target.length, self.source.length)
    }

    /// Playback speed, `source.length / target.length`.
    pub fn rate(&self) -> Result<f64> {
        self.ratio(self.source.length, self.target.length)
    }

    pub fn is_identity_rate(&self) -> bool {
        self.source.length == self.target.length
    }

    /// Maps a point inside the target window back onto the source timeline.
    pub fn source_time_at(&self, target_time: MediaTime) -> Result<MediaTime> {
        if self.target.is_empty() {
            return Ok(self.source.start);
        }
        if self.source.is_empty() {
            return Err(self.divide_by_zero());
        }
        let offset = target_time - self.target.start;
        Ok(self.source.start + offset.mul_div(self.source.length, self.target.length))
    }

    fn divide_by_zero(&self) -> ScaledTapError {
        ScaledTapError::DivideByZero {
            from: self.source,
            to: self.target,
        }
    }

    fn ratio(&self, num: MediaTime, den: MediaTime) -> Result<f64> {
        match (num.0, den.0) {
            (0, 0) => Ok(1.0),
            (_, 0) => Err(self.divide_by_zero()),
            (n, d) => Ok(n as f64 / d as f64),
        }
    }
}

impl fmt::Display for TimeMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_is_distinct_from_zero() {
        assert_ne!(TimeRange::INVALID, TimeRange::ZERO);
        assert!(!TimeRange::INVALID.is_valid());
        assert!(TimeRange::ZERO.is_valid());
        assert!(TimeRange::ZERO.is_empty());
    }

    #[test]
    fn scale_factor_is_target_over_source() {
        let mapping = TimeMapping::new(TimeRange::from_secs(3, 2), TimeRange::from_secs(2, 4));
        assert_eq!(mapping.scale_factor().unwrap(), 2.0);
        assert_eq!(mapping.rate().unwrap(), 0.5);

        for (source, target) in [(1, 1), (2, 4), (4, 2), (3, 7), (10, 1)] {
            let mapping =
                TimeMapping::new(TimeRange::from_secs(0, source), TimeRange::from_secs(0, target));
            let factor = mapping.scale_factor().unwrap();
            assert!(factor > 0.0);
            assert_eq!(factor, target as f64 / source as f64);
        }
    }

    #[test]
    fn empty_source_onto_content_divides_by_zero() {
        let mapping = TimeMapping::new(TimeRange::from_secs(0, 0), TimeRange::from_secs(2, 4));
        let err = mapping.scale_factor().unwrap_err();
        assert!(matches!(err, ScaledTapError::DivideByZero { .. }));
    }

    #[test]
    fn empty_onto_empty_is_a_placeholder() {
        let mapping = TimeMapping::new(TimeRange::ZERO, TimeRange::from_secs(5, 0));
        assert_eq!(mapping.scale_factor().unwrap(), 1.0);
        assert_eq!(mapping.rate().unwrap(), 1.0);
    }

    #[test]
    fn maps_target_points_back_to_source() {
        let mapping = TimeMapping::new(TimeRange::from_secs(3, 2), TimeRange::from_secs(2, 4));
        assert_eq!(
            mapping.source_time_at(MediaTime::from_secs(4)).unwrap(),
            MediaTime::from_secs(4)
        );
        assert_eq!(
            mapping.source_time_at(MediaTime::from_secs(6)).unwrap(),
            MediaTime::from_secs(5)
        );
    }

    #[test]
    fn range_set_operations() {
        let a = TimeRange::from_secs(0, 4);
        let b = TimeRange::from_secs(2, 4);
        let c = TimeRange::from_secs(4, 1);

        assert_eq!(a.intersection(&b), Some(TimeRange::from_secs(2, 2)));
        assert!(!a.intersects(&c));
        assert_eq!(a.intersection(&c), None);
        assert_eq!(a.union(&c), TimeRange::from_secs(0, 5));
        assert!(a.contains(MediaTime::ZERO));
        assert!(!a.contains(MediaTime::from_secs(4)));
    }

    #[test]
    fn frames_convert_both_ways() {
        let quantum = MediaTime::from_frames(48_000, 48_000);
        assert_eq!(quantum, MediaTime::from_secs(1));
        assert_eq!(MediaTime::from_secs(2).to_frames(44_100), 88_200);
        assert_eq!(MediaTime::from_nanos(-5).to_frames(44_100), 0);
    }

    #[test]
    fn displays_whole_and_fractional_seconds() {
        assert_eq!(TimeRange::from_secs(2, 4).to_string(), "[2s, 6s)");
        assert_eq!(MediaTime::from_millis(1500).to_string(), "1.500s");
        assert_eq!(TimeRange::INVALID.to_string(), "[invalid]");
    }

    #[test]
    fn mul_div_rounds_to_nearest() {
        let third =
            MediaTime::from_nanos(10).mul_div(MediaTime::from_nanos(1), MediaTime::from_nanos(3));
        assert_eq!(third, MediaTime::from_nanos(3));
        let neg =
            MediaTime::from_nanos(-10).mul_div(MediaTime::from_nanos(1), MediaTime::from_nanos(4));
        assert_eq!(neg, MediaTime::from_nanos(-3));
    }
}
