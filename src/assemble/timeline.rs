use crate::foundation::{
    core::{FrameIndex, FrameRange, Fps},
    error::{SlideError, SlideResult},
};

/// One slide's slot in the output video.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct TimelineEntry {
    pub index: usize,
    /// Probed narration length.
    pub audio_secs: f64,
    pub frames: FrameRange,
}

impl TimelineEntry {
    pub fn frame_count(&self) -> u64 {
        self.frames.len_frames()
    }

    /// Exact on-screen time of this slot, a whole number of frames.
    pub fn span_secs(&self, fps: Fps) -> f64 {
        fps.frames_to_secs(self.frame_count())
    }

    pub fn start_secs(&self, fps: Fps) -> f64 {
        fps.frames_to_secs(self.frames.start.0)
    }
}

/// Ordered, gapless frame plan for a deck.
///
/// Frame boundaries are rounded from cumulative audio time rather than per segment, so
/// rounding error never accumulates: every boundary is within half a frame of the true
/// audio boundary, however long the deck. Whether a track is accepted depends only on its
/// own length: anything shorter than half a frame is rejected, and every accepted track
/// gets at least one frame. When that minimum pushes a boundary past its rounded
/// position, the following segment absorbs the difference.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    fps: Fps,
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn build(durations_secs: &[f64], fps: Fps) -> SlideResult<Self> {
        if durations_secs.is_empty() {
            return Err(SlideError::validation("a deck needs at least one segment"));
        }

        let mut entries = Vec::with_capacity(durations_secs.len());
        let mut elapsed = 0.0f64;
        let mut start = FrameIndex(0);
        for (index, &secs) in durations_secs.iter().enumerate() {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(
                    SlideError::validation(format!("audio duration {secs} is not positive"))
                        .for_slide(index),
                );
            }
            if secs * fps.as_f64() < 0.5 {
                return Err(SlideError::validation(format!(
                    "audio of {secs:.3}s is shorter than half a frame at {}/{} fps",
                    fps.num, fps.den
                ))
                .for_slide(index));
            }
            elapsed += secs;
            let rounded = fps.secs_to_frames_round(elapsed);
            let end = FrameIndex(rounded.max(start.0 + 1));
            entries.push(TimelineEntry {
                index,
                audio_secs: secs,
                frames: FrameRange::new(start, end)?,
            });
            start = end;
        }

        Ok(Self { fps, entries })
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_frames(&self) -> u64 {
        self.entries.last().map_or(0, |e| e.frames.end.0)
    }

    pub fn total_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.total_frames())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assemble/timeline.rs"]
mod tests;
