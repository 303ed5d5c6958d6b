use crate::config::{LayoutConfig, TypeScale};
use crate::foundation::core::Canvas;

/// Measures the advance width of a string at a pixel size.
///
/// Implementations must be deterministic and monotonic: appending characters never makes
/// a string narrower. The wrapper's greedy packing relies on both.
pub trait TextMeasure: Send + Sync {
    fn advance(&self, text: &str, size_px: f32) -> f32;
}

/// Logical text size, resolved to pixels by the type scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Title,
    /// Heading level 1..=6; out-of-range levels clamp.
    Heading(u8),
    Body,
    Caption,
}

impl SizeClass {
    /// Reference-height pixel size for this class.
    pub fn reference_px(self, scale: &TypeScale) -> f32 {
        match self {
            Self::Title => scale.title_px,
            Self::Heading(level) => scale.heading_px[usize::from(level.clamp(1, 6) - 1)],
            Self::Body => scale.body_px,
            Self::Caption => scale.caption_px,
        }
    }
}

/// A measuring handle bound to one resolved size.
#[derive(Clone, Copy)]
pub struct FontMetrics<'a> {
    measure: &'a dyn TextMeasure,
    size_px: f32,
    line_pitch: f32,
}

impl std::fmt::Debug for FontMetrics<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("size_px", &self.size_px)
            .field("line_pitch", &self.line_pitch)
            .finish()
    }
}

impl<'a> FontMetrics<'a> {
    pub fn new(measure: &'a dyn TextMeasure, size_px: f32, line_pitch: f32) -> Self {
        Self {
            measure,
            size_px,
            line_pitch,
        }
    }

    pub fn width(&self, text: &str) -> f32 {
        self.measure.advance(text, self.size_px)
    }

    pub fn size_px(&self) -> f32 {
        self.size_px
    }

    /// Vertical distance between successive lines at this size.
    pub fn line_pitch(&self) -> f32 {
        self.line_pitch
    }
}

/// Resolves size classes for one canvas.
#[derive(Clone, Copy)]
pub struct MetricsProvider<'a> {
    measure: &'a dyn TextMeasure,
    scale: &'a TypeScale,
    factor: f32,
    pitch_ratio: f32,
}

impl<'a> MetricsProvider<'a> {
    pub fn new(measure: &'a dyn TextMeasure, layout: &'a LayoutConfig, canvas: Canvas) -> Self {
        Self {
            measure,
            scale: &layout.type_scale,
            factor: canvas.type_scale_factor(),
            pitch_ratio: layout.line_pitch_ratio,
        }
    }

    pub fn metrics(&self, class: SizeClass) -> FontMetrics<'a> {
        let size_px = class.reference_px(self.scale) * self.factor;
        FontMetrics::new(self.measure, size_px, size_px * self.pitch_ratio)
    }
}

/// Fixed per-character advance: `chars * size_px * ratio`.
///
/// Stands in for real font data where only geometry matters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedAdvance {
    pub ratio: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { ratio: 0.5 }
    }
}

impl TextMeasure for FixedAdvance {
    fn advance(&self, text: &str, size_px: f32) -> f32 {
        text.chars().count() as f32 * size_px * self.ratio
    }
}
