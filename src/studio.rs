//! Request-level facade over the compositor, the assembler, and the asset store.
//!
//! One `Studio` per process: it owns the loaded font, the HTTP client, and the worker pool,
//! and every method is safe to call from several threads at once (except
//! [`Studio::clear_assets`] racing an in-flight [`Studio::assemble_deck`]).

use std::{fs::File, path::PathBuf, sync::Arc};

use rayon::prelude::*;

use crate::{
    assemble::{AssembledVideo, Assembler, AudioTrack, SegmentSummary},
    assets::{AssetStore, ClearReport, DefaultImageSource, ImageSource, VideoId},
    cancel::CancelToken,
    config::StudioConfig,
    foundation::{
        core::Canvas,
        error::{SlideError, SlideResult},
    },
    render::{ComposedSlide, Compositor, PlannedSlide, SlideSpec, SlideWarning},
    text::FontBook,
};

/// One slide as it arrives at the boundary.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SlideRequest {
    pub title: String,
    #[serde(alias = "content", default)]
    pub body_markdown: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(alias = "image_subtitle", default)]
    pub image_caption: Option<String>,
}

impl SlideRequest {
    pub fn new(title: impl Into<String>, body_markdown: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body_markdown: body_markdown.into(),
            image_url: None,
            image_caption: None,
        }
    }

    pub fn into_spec(self, canvas: Canvas) -> SlideSpec {
        SlideSpec {
            title: self.title,
            body_markdown: self.body_markdown,
            image_url: self.image_url,
            image_caption: self.image_caption,
            canvas,
        }
    }

    fn to_spec(&self, canvas: Canvas) -> SlideSpec {
        self.clone().into_spec(canvas)
    }
}

/// A composed slide encoded for transport.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SlideImage {
    pub width: u32,
    pub height: u32,
    pub png_base64: String,
    pub warnings: Vec<SlideWarning>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DeckWarning {
    pub slide_index: usize,
    #[serde(flatten)]
    pub warning: SlideWarning,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct DeckOutput {
    pub video_id: VideoId,
    pub video_path: PathBuf,
    pub duration_secs: f64,
    pub segments: Vec<SegmentSummary>,
    pub warnings: Vec<DeckWarning>,
}

pub struct Studio {
    config: StudioConfig,
    compositor: Compositor,
    assembler: Assembler,
    pool: Arc<rayon::ThreadPool>,
}

impl std::fmt::Debug for Studio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Studio")
            .field("canvas", &self.config.canvas)
            .field("asset_dir", &self.config.asset_dir)
            .finish_non_exhaustive()
    }
}

impl Studio {
    /// Load fonts and open the asset directory named by `config`.
    pub fn new(config: StudioConfig) -> SlideResult<Self> {
        config.validate()?;
        let fonts = Arc::new(FontBook::load(&config.fonts)?);
        let images: Arc<dyn ImageSource> = Arc::new(DefaultImageSource::new(config.fetch.clone())?);
        Self::with_parts(config, fonts, images)
    }

    /// Build from an already loaded font and a custom image source.
    pub fn with_parts(
        config: StudioConfig,
        fonts: Arc<FontBook>,
        images: Arc<dyn ImageSource>,
    ) -> SlideResult<Self> {
        config.validate()?;
        let pool = Arc::new(build_thread_pool(config.threads)?);
        let store = AssetStore::open(&config.asset_dir)?;
        tracing::info!(
            font = fonts.family(),
            asset_dir = %store.root().display(),
            canvas = ?config.canvas,
            "studio ready"
        );
        Ok(Self {
            compositor: Compositor::new(config.layout.clone(), fonts, images),
            assembler: Assembler::new(store, config.encode.clone(), Arc::clone(&pool)),
            config,
            pool,
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn compose_slide(&self, request: &SlideRequest) -> SlideResult<SlideImage> {
        let composed = self
            .compositor
            .compose(&request.to_spec(self.config.canvas), &CancelToken::new())?;
        Ok(SlideImage {
            width: composed.slide.width(),
            height: composed.slide.height(),
            png_base64: composed.slide.to_png_base64()?,
            warnings: composed.warnings,
        })
    }

    pub fn plan_slide(&self, request: &SlideRequest) -> SlideResult<PlannedSlide> {
        self.compositor
            .plan(&request.to_spec(self.config.canvas), &CancelToken::new())
    }

    /// Compose every slide in parallel. Results keep deck order; the first failure (by
    /// index) is returned, tagged with its slide index.
    pub fn compose_deck(
        &self,
        requests: &[SlideRequest],
        cancel: &CancelToken,
    ) -> SlideResult<Vec<ComposedSlide>> {
        let canvas = self.config.canvas;
        let results: Vec<SlideResult<ComposedSlide>> = self.pool.install(|| {
            requests
                .par_iter()
                .enumerate()
                .map(|(index, request)| {
                    cancel.check()?;
                    self.compositor
                        .compose(&request.to_spec(canvas), cancel)
                        .map_err(|e| e.for_slide(index))
                })
                .collect()
        });
        results.into_iter().collect()
    }

    /// Compose `requests`, pair them with `audio` by index, and encode one video.
    #[tracing::instrument(level = "info", skip_all, fields(slides = requests.len()))]
    pub fn assemble_deck(
        &self,
        requests: &[SlideRequest],
        audio: Vec<AudioTrack>,
        cancel: &CancelToken,
    ) -> SlideResult<DeckOutput> {
        if requests.len() != audio.len() {
            return Err(SlideError::CountMismatch {
                slides: requests.len(),
                audio_tracks: audio.len(),
            });
        }
        if requests.is_empty() {
            return Err(SlideError::validation("a deck needs at least one slide"));
        }

        let composed = self.compose_deck(requests, cancel)?;
        let mut warnings = Vec::new();
        let mut slides = Vec::with_capacity(composed.len());
        for (slide_index, c) in composed.into_iter().enumerate() {
            warnings.extend(
                c.warnings
                    .into_iter()
                    .map(|warning| DeckWarning {
                        slide_index,
                        warning,
                    }),
            );
            slides.push(c.slide);
        }

        let AssembledVideo {
            id,
            path,
            duration_secs,
            segments,
        } = self.assembler.assemble(slides, audio, cancel)?;
        Ok(DeckOutput {
            video_id: id,
            video_path: path,
            duration_secs,
            segments,
            warnings,
        })
    }

    pub fn fetch_video(&self, id: &str) -> SlideResult<File> {
        self.assembler.store().open_video(id)
    }

    /// Delete every generated video and scratch directory. Idempotent.
    pub fn clear_assets(&self) -> SlideResult<ClearReport> {
        self.assembler.store().clear()
    }
}

fn build_thread_pool(threads: Option<usize>) -> SlideResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SlideError::validation("'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("slidereel-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SlideError::validation(format!("failed to build rayon thread pool: {e}")))
}
