//! Slide composition: markdown and an optional image in, a painted slide out.
//!
//! Image problems never fail a slide unless [`LayoutConfig::strict_images`] is set; they
//! surface as [`SlideWarning`]s on the result instead. Cancellation always fails it.

use std::sync::Arc;

use crate::{
    assets::{DecodedImage, ImageSource, decode_image},
    cancel::CancelToken,
    config::LayoutConfig,
    foundation::{
        core::Canvas,
        error::{SlideError, SlideResult},
    },
    layout::{LayoutInput, SlideGeometry, SlidePlan, layout_slide},
    markdown::parse_blocks,
    render::{RenderedSlide, paint::paint_slide},
    text::{FontBook, MetricsProvider, TextMeasure},
};

/// Everything needed to draw one slide.
#[derive(Clone, Debug, PartialEq)]
pub struct SlideSpec {
    pub title: String,
    pub body_markdown: String,
    pub image_url: Option<String>,
    pub image_caption: Option<String>,
    pub canvas: Canvas,
}

impl SlideSpec {
    pub fn new(title: impl Into<String>, body_markdown: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body_markdown: body_markdown.into(),
            image_url: None,
            image_caption: None,
            canvas: Canvas::default(),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>, caption: Option<String>) -> Self {
        self.image_url = Some(url.into());
        self.image_caption = caption;
        self
    }

    pub fn with_canvas(mut self, canvas: Canvas) -> Self {
        self.canvas = canvas;
        self
    }

    fn image_reference(&self) -> Option<&str> {
        self.image_url.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn caption(&self) -> Option<&str> {
        self.image_caption
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A degradation the slide was produced despite.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlideWarning {
    /// The requested image is not on the slide.
    ImageOmitted { reference: String, reason: String },
    /// A caption was given without a usable image and was dropped.
    CaptionWithoutImage,
    /// Lines that would cross the bottom margin were dropped.
    TextTruncated { dropped_lines: usize },
}

impl std::fmt::Display for SlideWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageOmitted { reference, reason } => {
                write!(f, "image '{reference}' omitted: {reason}")
            }
            Self::CaptionWithoutImage => f.write_str("caption dropped: no image on slide"),
            Self::TextTruncated { dropped_lines } => {
                write!(f, "{dropped_lines} overflowing line(s) dropped")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ComposedSlide {
    pub slide: RenderedSlide,
    pub warnings: Vec<SlideWarning>,
}

impl ComposedSlide {
    /// True when an image was requested but is not on the slide.
    pub fn image_omitted(&self) -> bool {
        image_omitted(&self.warnings)
    }
}

/// Layout result without pixels.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PlannedSlide {
    pub plan: SlidePlan,
    pub warnings: Vec<SlideWarning>,
}

impl PlannedSlide {
    pub fn image_omitted(&self) -> bool {
        image_omitted(&self.warnings)
    }
}

fn image_omitted(warnings: &[SlideWarning]) -> bool {
    warnings
        .iter()
        .any(|w| matches!(w, SlideWarning::ImageOmitted { .. }))
}

struct Prepared {
    planned: PlannedSlide,
    image: Option<DecodedImage>,
}

/// Fetch and decode the image, then lay the slide out against `measure`.
fn prepare(
    spec: &SlideSpec,
    layout: &LayoutConfig,
    images: &dyn ImageSource,
    measure: &dyn TextMeasure,
    cancel: &CancelToken,
) -> SlideResult<Prepared> {
    spec.canvas.validate()?;
    cancel.check()?;
    let mut warnings = Vec::new();

    let mut image = None;
    if let Some(reference) = spec.image_reference() {
        let fetched = images.fetch(reference, cancel).and_then(|bytes| {
            decode_image(&bytes).map_err(|e| SlideError::asset_fetch(reference, e))
        });
        match fetched {
            Ok(decoded) => image = Some(decoded),
            Err(e @ SlideError::Cancelled) => return Err(e),
            Err(e) if layout.strict_images => return Err(e),
            Err(e) => {
                tracing::warn!(reference, error = %e, "image omitted from slide");
                warnings.push(SlideWarning::ImageOmitted {
                    reference: reference.to_string(),
                    reason: reason_of(&e),
                });
            }
        }
    }

    let blocks = parse_blocks(&spec.body_markdown);
    let provider = MetricsProvider::new(measure, layout, spec.canvas);
    let geometry = SlideGeometry::new(spec.canvas, layout);
    let caption = image.as_ref().and(spec.caption());
    let plan = layout_slide(
        LayoutInput {
            title: &spec.title,
            blocks: &blocks,
            image_size: image.as_ref().map(DecodedImage::size),
            caption,
        },
        &provider,
        layout,
        &geometry,
    );

    if image.is_some() && plan.image.is_none() {
        let reference = spec.image_reference().unwrap_or_default().to_string();
        if layout.strict_images {
            return Err(SlideError::asset_fetch(reference, "no room for the image on the slide"));
        }
        warnings.push(SlideWarning::ImageOmitted {
            reference,
            reason: "no room for the image on the slide".to_string(),
        });
        image = None;
    }
    if spec.caption().is_some() && image.is_none() {
        warnings.push(SlideWarning::CaptionWithoutImage);
    }
    if plan.dropped_lines > 0 {
        warnings.push(SlideWarning::TextTruncated {
            dropped_lines: plan.dropped_lines,
        });
    }

    Ok(Prepared {
        planned: PlannedSlide { plan, warnings },
        image,
    })
}

fn reason_of(err: &SlideError) -> String {
    match err {
        SlideError::AssetFetch { reason, .. } => reason.clone(),
        other => other.to_string(),
    }
}

/// Composes slides with one font and one image source. Shared freely across threads.
#[derive(Clone)]
pub struct Compositor {
    layout: LayoutConfig,
    fonts: Arc<FontBook>,
    images: Arc<dyn ImageSource>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("layout", &self.layout)
            .field("fonts", &self.fonts)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    pub fn new(layout: LayoutConfig, fonts: Arc<FontBook>, images: Arc<dyn ImageSource>) -> Self {
        Self {
            layout,
            fonts,
            images,
        }
    }

    /// Positioned lines, image placement, and warnings, without painting.
    pub fn plan(&self, spec: &SlideSpec, cancel: &CancelToken) -> SlideResult<PlannedSlide> {
        let prepared = prepare(
            spec,
            &self.layout,
            self.images.as_ref(),
            self.fonts.as_ref(),
            cancel,
        )?;
        Ok(prepared.planned)
    }

    /// Fetch, lay out and paint one slide. `cancel` reaches the image fetch and is checked
    /// again before painting.
    #[tracing::instrument(level = "debug", skip_all, fields(title = %spec.title))]
    pub fn compose(&self, spec: &SlideSpec, cancel: &CancelToken) -> SlideResult<ComposedSlide> {
        let Prepared { planned, image } = prepare(
            spec,
            &self.layout,
            self.images.as_ref(),
            self.fonts.as_ref(),
            cancel,
        )?;
        cancel.check()?;

        let prepared_image = match (planned.plan.image, image) {
            (Some(placement), Some(decoded)) => {
                Some(decoded.prepare(placement.width, placement.height))
            }
            _ => None,
        };

        let slide = paint_slide(
            &planned.plan,
            prepared_image.as_ref(),
            &self.fonts,
            self.layout.background,
            self.layout.text_color,
        )?;
        tracing::debug!(
            lines = planned.plan.lines.len(),
            warnings = planned.warnings.len(),
            "composed slide"
        );
        Ok(ComposedSlide {
            slide,
            warnings: planned.warnings,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compose.rs"]
mod tests;
