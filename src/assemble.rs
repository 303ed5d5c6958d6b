//! Narrated slide sequence to one MP4.
//!
//! Stages, each preceded by a cancellation check:
//! 1. validate the deck (pairing, dimensions),
//! 2. write stills and narration into a scratch directory, in parallel,
//! 3. probe narration durations, in parallel,
//! 4. plan the [`Timeline`],
//! 5. run one ffmpeg process that muxes every segment in deck order.
//!
//! The scratch directory is dropped on every exit path; the output file only appears under
//! its final name once ffmpeg has succeeded.

pub mod graph;
pub mod timeline;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    assets::{AssetStore, OutputSlot, VideoId, sniff_audio_extension},
    cancel::CancelToken,
    config::EncodeConfig,
    foundation::error::{SlideError, SlideResult},
    media,
    render::RenderedSlide,
};

pub use graph::{SegmentInputs, ffmpeg_args, filter_graph};
pub use timeline::{Timeline, TimelineEntry};

/// Narration for one slide.
#[derive(Clone, PartialEq, Eq)]
pub enum AudioTrack {
    /// Encoded audio held in memory. `extension` is a container hint; when absent it is
    /// sniffed from the bytes.
    Bytes {
        data: Vec<u8>,
        extension: Option<String>,
    },
    /// Encoded audio already on disk.
    File(PathBuf),
}

impl std::fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes { data, extension } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("extension", extension)
                .finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl AudioTrack {
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self::Bytes {
            data,
            extension: None,
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    fn extension(&self) -> String {
        match self {
            Self::Bytes { data, extension } => extension
                .as_deref()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
                .or_else(|| sniff_audio_extension(data).map(str::to_string))
                .unwrap_or_else(|| "bin".to_string()),
            Self::File(path) => path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Materialize into `dir`, returning the path ffmpeg should read.
    fn stage(&self, dir: &Path, index: usize) -> SlideResult<PathBuf> {
        match self {
            Self::Bytes { data, .. } => {
                if data.is_empty() {
                    return Err(SlideError::validation("audio track is empty"));
                }
                let path = dir.join(format!("audio_{index:04}.{}", self.extension()));
                std::fs::write(&path, data)
                    .with_context(|| format!("write audio '{}'", path.display()))?;
                Ok(path)
            }
            Self::File(path) => {
                if !path.is_file() {
                    return Err(SlideError::validation(format!(
                        "audio file '{}' does not exist",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
        }
    }
}

/// One prepared pair, with its probed narration length.
#[derive(Clone, Debug, PartialEq)]
pub struct NarratedSegment {
    pub index: usize,
    pub inputs: SegmentInputs,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SegmentSummary {
    pub index: usize,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub audio_secs: f64,
    pub start_frame: u64,
    pub end_frame: u64,
}

impl SegmentSummary {
    fn from_entry(entry: &TimelineEntry, timeline: &Timeline) -> Self {
        let fps = timeline.fps();
        Self {
            index: entry.index,
            start_secs: entry.start_secs(fps),
            duration_secs: entry.span_secs(fps),
            audio_secs: entry.audio_secs,
            start_frame: entry.frames.start.0,
            end_frame: entry.frames.end.0,
        }
    }
}

/// The finished video. It stays in the asset store until it is cleared.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AssembledVideo {
    pub id: VideoId,
    pub path: PathBuf,
    pub duration_secs: f64,
    pub segments: Vec<SegmentSummary>,
}

/// Removes the partial output unless the slot was committed.
struct PartialOutputGuard<'a> {
    slot: Option<&'a OutputSlot>,
}

impl PartialOutputGuard<'_> {
    fn disarm(&mut self) {
        self.slot = None;
    }
}

impl Drop for PartialOutputGuard<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.discard();
        }
    }
}

#[derive(Clone, Debug)]
pub struct Assembler {
    store: AssetStore,
    encode: EncodeConfig,
    pool: Arc<rayon::ThreadPool>,
}

impl Assembler {
    pub fn new(store: AssetStore, encode: EncodeConfig, pool: Arc<rayon::ThreadPool>) -> Self {
        Self {
            store,
            encode,
            pool,
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Pair `slides[i]` with `audio[i]` and encode the sequence.
    #[tracing::instrument(level = "info", skip_all, fields(slides = slides.len(), audio = audio.len()))]
    pub fn assemble(
        &self,
        slides: Vec<RenderedSlide>,
        audio: Vec<AudioTrack>,
        cancel: &CancelToken,
    ) -> SlideResult<AssembledVideo> {
        validate_deck(&slides, &audio)?;
        self.encode.validate()?;
        cancel.check()?;

        let scratch = self.store.scratch_dir()?;
        tracing::debug!(dir = %scratch.path().display(), "created scratch dir");

        let segments = self.prepare_segments(&slides, &audio, scratch.path(), cancel)?;
        drop(slides);
        cancel.check()?;

        let durations: Vec<f64> = segments.iter().map(|s| s.duration_secs).collect();
        let timeline = Timeline::build(&durations, self.encode.fps)?;
        tracing::info!(
            segments = timeline.len(),
            total_secs = timeline.total_secs(),
            "planned timeline"
        );
        cancel.check()?;

        let slot = self.store.allocate();
        let mut guard = PartialOutputGuard { slot: Some(&slot) };
        let inputs: Vec<SegmentInputs> = segments.into_iter().map(|s| s.inputs).collect();
        let args = ffmpeg_args(&inputs, &timeline, &self.encode, &slot.partial)?;
        media::run_ffmpeg(&args, cancel)?;
        cancel.check()?;
        slot.commit()?;
        guard.disarm();

        let video = AssembledVideo {
            id: slot.id.clone(),
            path: slot.final_path.clone(),
            duration_secs: timeline.total_secs(),
            segments: timeline
                .entries()
                .iter()
                .map(|e| SegmentSummary::from_entry(e, &timeline))
                .collect(),
        };
        tracing::info!(id = %video.id, duration_secs = video.duration_secs, "assembled video");
        Ok(video)
    }

    /// Write stills and narration, then probe durations. Order follows the deck.
    fn prepare_segments(
        &self,
        slides: &[RenderedSlide],
        audio: &[AudioTrack],
        dir: &Path,
        cancel: &CancelToken,
    ) -> SlideResult<Vec<NarratedSegment>> {
        let results: Vec<SlideResult<NarratedSegment>> = self.pool.install(|| {
            slides
                .par_iter()
                .zip(audio.par_iter())
                .enumerate()
                .map(|(index, (slide, track))| {
                    prepare_segment(index, slide, track, dir, cancel).map_err(|e| e.for_slide(index))
                })
                .collect()
        });
        results.into_iter().collect()
    }
}

fn prepare_segment(
    index: usize,
    slide: &RenderedSlide,
    track: &AudioTrack,
    dir: &Path,
    cancel: &CancelToken,
) -> SlideResult<NarratedSegment> {
    cancel.check()?;
    let slide_png = dir.join(format!("slide_{index:04}.png"));
    slide.write_png(&slide_png)?;
    let audio = track.stage(dir, index)?;

    cancel.check()?;
    let duration_secs = media::probe_duration_secs(&audio)?;
    tracing::debug!(index, duration_secs, "probed narration");
    Ok(NarratedSegment {
        index,
        inputs: SegmentInputs { slide_png, audio },
        duration_secs,
    })
}

/// Checks done before any I/O.
pub fn validate_deck(slides: &[RenderedSlide], audio: &[AudioTrack]) -> SlideResult<()> {
    if slides.len() != audio.len() {
        return Err(SlideError::CountMismatch {
            slides: slides.len(),
            audio_tracks: audio.len(),
        });
    }
    let Some(first) = slides.first() else {
        return Err(SlideError::validation("a deck needs at least one slide"));
    };

    let (w, h) = (first.width(), first.height());
    if !w.is_multiple_of(2) || !h.is_multiple_of(2) {
        return Err(SlideError::validation(format!(
            "slides are {w}x{h}; width/height must be even (required for yuv420p mp4 output)"
        )));
    }
    for (index, slide) in slides.iter().enumerate() {
        if (slide.width(), slide.height()) != (w, h) {
            return Err(SlideError::validation(format!(
                "slide is {}x{}, expected {w}x{h} like the first slide",
                slide.width(),
                slide.height()
            ))
            .for_slide(index));
        }
    }
    Ok(())
}
