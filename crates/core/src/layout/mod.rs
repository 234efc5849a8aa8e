//! Plain-text pictures of a composition for the command line.
//!
//! ```text
//! time:     0s--1s--2s--3s--4s--5s--6s
//! video 1:  xxxxxxxxy y y y y y y y
//! audio 2:  xxxxxxxx
//! audio 3:  --------y y y y y y y y
//! ```

use std::fmt::Write as _;

use crate::{Composition, MediaTime, Result, Segment, Track};

const LABEL_WIDTH: usize = 10;
const MIN_CELLS_PER_SECOND: u32 = 4;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Renders compositions as one text row per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    cells_per_second: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            cells_per_second: MIN_CELLS_PER_SECOND,
        }
    }
}

impl Layout {
    /// Resolution of the diagram; values below four are raised so second
    /// labels fit.
    pub fn new(cells_per_second: u32) -> Self {
        Self {
            cells_per_second: cells_per_second.max(MIN_CELLS_PER_SECOND),
        }
    }

    pub fn cells_per_second(&self) -> u32 {
        self.cells_per_second
    }

    /// Time ruler followed by one row per track. Unscaled content is drawn
    /// as `x`, scaled content as `y` once per source cell so slowed-down
    /// audio appears spaced out, and gaps as `-`.
    pub fn diagram(&self, composition: &Composition) -> Result<String> {
        let mut out = String::new();
        out.push_str(&self.ruler(composition.duration()));
        for track in composition.all_tracks() {
            out.push('\n');
            out.push_str(&self.row(track)?);
        }
        Ok(out)
    }

    /// One line per segment: track, placement, source range and rate.
    pub fn segment_table(&self, composition: &Composition) -> Result<String> {
        let mut out = String::new();
        let _ = write!(
            out,
            "{:<8}{:<7}{:<16}{:<16}{}",
            "track", "kind", "placement", "source", "rate"
        );
        for track in composition.all_tracks() {
            for segment in track.segments() {
                let source = match segment.source() {
                    Some(source) => format!("{}", source.range),
                    None => "empty".to_string(),
                };
                let _ = write!(
                    out,
                    "\n{:<8}{:<7}{:<16}{:<16}{}",
                    track.id().to_string(),
                    track.kind().to_string(),
                    segment.placement().to_string(),
                    source,
                    segment.rate()?
                );
            }
        }
        Ok(out)
    }

    fn ruler(&self, duration: MediaTime) -> String {
        let mut out = format!("{:<LABEL_WIDTH$}", "time:");
        let secs = (duration.as_nanos().max(0) as u64).div_ceil(NANOS_PER_SEC);
        let cells = self.cells_per_second as usize;
        for sec in 0..=secs {
            let label = format!("{sec}s");
            out.push_str(&label);
            if sec < secs {
                out.extend(std::iter::repeat('-').take(cells.saturating_sub(label.len())));
            }
        }
        out
    }

    fn row(&self, track: &Track) -> Result<String> {
        let mut out = format!("{:<LABEL_WIDTH$}", format!("{} {}:", track.kind(), track.id()));
        let cells = track.extent().end().to_frames(self.cells_per_second);
        let mut previous: Option<(&Segment, u64)> = None;

        for cell in 0..cells {
            let at = MediaTime::from_frames(cell, self.cells_per_second);
            let glyph = match track.segment_at(at) {
                Some(segment) if !segment.is_empty() => {
                    let source_cell = self.source_cell(segment, at)?;
                    let fresh = !matches!(
                        previous,
                        Some((last, index)) if std::ptr::eq(last, segment) && index == source_cell
                    );
                    previous = Some((segment, source_cell));
                    match (segment.is_scaled(), fresh) {
                        (false, _) => 'x',
                        (true, true) => 'y',
                        (true, false) => ' ',
                    }
                }
                _ => {
                    previous = None;
                    '-'
                }
            };
            out.push(glyph);
        }
        Ok(out.trim_end().to_string())
    }

    /// Index of the source cell feeding target time `at`.
    fn source_cell(&self, segment: &Segment, at: MediaTime) -> Result<u64> {
        let mapping = segment.mapping();
        let source = mapping.source_time_at(at)?;
        Ok((source - mapping.source.start).to_frames(self.cells_per_second))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GapPolicy, SourceMedia, Variant};

    fn diagram(variant: Variant) -> String {
        let media =
            SourceMedia::audio_video("video.mp4", MediaTime::from_secs(8), MediaTime::from_secs(8));
        let composition = variant.build(&media, GapPolicy::Reject).unwrap();
        Layout::default().diagram(&composition).unwrap()
    }

    #[test]
    fn draws_the_two_track_layout() {
        let lines: Vec<_> = diagram(Variant::TwoAudioTracks).lines().map(str::to_owned).collect();
        assert_eq!(
            lines,
            vec![
                "time:     0s--1s--2s--3s--4s--5s--6s",
                "video 1:  xxxxxxxxy y y y y y y y",
                "audio 2:  xxxxxxxx",
                "audio 3:  --------y y y y y y y y",
            ]
        );
    }

    #[test]
    fn single_track_layout_shares_the_video_row() {
        let text = diagram(Variant::OneAudioTrack);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(&lines[1][LABEL_WIDTH..], &lines[2][LABEL_WIDTH..]);
    }

    #[test]
    fn resolution_has_a_floor() {
        assert_eq!(Layout::new(1).cells_per_second(), 4);
        assert_eq!(Layout::new(8).cells_per_second(), 8);
    }

    #[test]
    fn table_lists_every_segment() {
        let media =
            SourceMedia::audio_video("video.mp4", MediaTime::from_secs(8), MediaTime::from_secs(8));
        let composition = Variant::OneAudioTrackWithSilence
            .build(&media, GapPolicy::Reject)
            .unwrap();
        let table = Layout::default().segment_table(&composition).unwrap();
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("2       audio  [2s, 6s)"));
        assert!(lines[3].ends_with("0.5"));
    }
}
