//! Slide geometry and vertical cursor accounting.
//!
//! Nothing here touches pixels: the output is a [`SlidePlan`] of positioned lines and an
//! optional image box, which the painter then rasterizes as-is.

use crate::{
    config::{LayoutConfig, OverflowPolicy},
    foundation::core::{Canvas, Rect},
    layout::wrap::wrap_text,
    markdown::{ContentBlock, ListMarker},
    text::{FontMetrics, MetricsProvider, SizeClass},
};

/// Canvas regions derived from the layout fractions for one canvas size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlideGeometry {
    pub canvas: Canvas,
    /// Left edge of all text.
    pub margin_x: f32,
    /// Width available to the title (full canvas minus both margins).
    pub title_width: f32,
    /// Width of the body text column.
    pub column_width: f32,
    pub title_top: f32,
    /// Side region reserved for the image and its caption.
    pub image_region: Rect,
    /// Lines may not cross this when overflow is truncated.
    pub bottom_limit: f32,
    pub list_indent: f32,
    pub title_gap: f32,
    pub heading_gap: f32,
    pub caption_gap: f32,
}

impl SlideGeometry {
    pub fn new(canvas: Canvas, layout: &LayoutConfig) -> Self {
        let w = canvas.width as f32;
        let h = canvas.height as f32;
        let factor = canvas.type_scale_factor();
        let margin_x = w * layout.margin_x_frac;

        let image_x0 = w * layout.column_frac + margin_x;
        let image_x1 = (w - margin_x).max(image_x0);
        let image_y0 = h * layout.image_top_frac;
        let image_y1 = (image_y0 + h * layout.image_height_frac).min(h);

        Self {
            canvas,
            margin_x,
            title_width: (w - 2.0 * margin_x).max(1.0),
            column_width: (w * layout.column_frac - 2.0 * margin_x).max(1.0),
            title_top: h * layout.margin_top_frac,
            image_region: Rect::new(
                f64::from(image_x0),
                f64::from(image_y0),
                f64::from(image_x1),
                f64::from(image_y1.max(image_y0)),
            ),
            bottom_limit: h * (1.0 - layout.margin_bottom_frac),
            list_indent: layout.list_indent_px * factor,
            title_gap: layout.title_gap_px * factor,
            heading_gap: layout.heading_gap_px * factor,
            caption_gap: layout.caption_gap_px * factor,
        }
    }
}

/// What a placed line belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRole {
    Title,
    Heading(u8),
    Paragraph,
    ListItem,
    Caption,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    /// Top of the line box.
    pub y: f32,
    pub size_px: f32,
    pub pitch: f32,
    pub role: TextRole,
}

/// Destination box of the side image, already scaled to fit.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ImagePlacement {
    pub x: f32,
    pub y: f32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SlidePlan {
    pub canvas: Canvas,
    pub lines: Vec<PlacedLine>,
    pub image: Option<ImagePlacement>,
    /// Body cursor after the last block.
    pub cursor_end: f32,
    /// Lines dropped by [`OverflowPolicy::Truncate`].
    pub dropped_lines: usize,
}

impl SlidePlan {
    pub fn lines_with_role(&self, role: TextRole) -> impl Iterator<Item = &PlacedLine> {
        self.lines.iter().filter(move |l| l.role == role)
    }
}

/// Scale `(width, height)` to the largest size that fits `(max_w, max_h)` with the same
/// aspect ratio. `None` when either side would collapse below one pixel.
pub fn fit_within(width: u32, height: u32, max_w: f32, max_h: f32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || max_w < 1.0 || max_h < 1.0 {
        return None;
    }
    let scale = (max_w / width as f32).min(max_h / height as f32);
    let w = ((width as f32 * scale).floor() as u32).max(1);
    let h = ((height as f32 * scale).floor() as u32).max(1);
    Some((w.min(max_w as u32), h.min(max_h as u32)))
}

/// Inputs for one slide layout pass.
#[derive(Clone, Copy, Debug)]
pub struct LayoutInput<'a> {
    pub title: &'a str,
    pub blocks: &'a [ContentBlock],
    /// Natural pixel size of a successfully decoded side image.
    pub image_size: Option<(u32, u32)>,
    pub caption: Option<&'a str>,
}

struct Cursor<'p> {
    y: f32,
    plan: &'p mut SlidePlan,
    overflow: OverflowPolicy,
    bottom_limit: f32,
}

impl Cursor<'_> {
    fn place(&mut self, text: String, x: f32, metrics: &FontMetrics<'_>, role: TextRole) {
        let pitch = metrics.line_pitch();
        if self.overflow == OverflowPolicy::Truncate && self.y + pitch > self.bottom_limit {
            self.plan.dropped_lines += 1;
        } else {
            self.plan.lines.push(PlacedLine {
                text,
                x,
                y: self.y,
                size_px: metrics.size_px(),
                pitch,
                role,
            });
        }
        self.y += pitch;
    }

    fn advance(&mut self, dy: f32) {
        self.y += dy;
    }
}

/// Lay out title, body blocks, and the optional image + caption.
pub fn layout_slide(
    input: LayoutInput<'_>,
    provider: &MetricsProvider<'_>,
    layout: &LayoutConfig,
    geometry: &SlideGeometry,
) -> SlidePlan {
    let mut plan = SlidePlan {
        canvas: geometry.canvas,
        lines: Vec::new(),
        image: None,
        cursor_end: geometry.title_top,
        dropped_lines: 0,
    };
    let mut cursor = Cursor {
        y: geometry.title_top,
        plan: &mut plan,
        overflow: layout.overflow,
        bottom_limit: geometry.bottom_limit,
    };

    let title_metrics = provider.metrics(SizeClass::Title);
    let title_lines = wrap_text(input.title, &title_metrics, geometry.title_width);
    if !title_lines.is_empty() {
        for line in title_lines {
            cursor.place(line.text(), geometry.margin_x, &title_metrics, TextRole::Title);
        }
        cursor.advance(geometry.title_gap);
    }
    let title_bottom = cursor.y;

    for block in input.blocks {
        let (class, role, x, width, prefix) = match block {
            ContentBlock::Paragraph { .. } => (
                SizeClass::Body,
                TextRole::Paragraph,
                geometry.margin_x,
                geometry.column_width,
                None,
            ),
            ContentBlock::Heading { level, .. } => (
                SizeClass::Heading(*level),
                TextRole::Heading(*level),
                geometry.margin_x,
                geometry.column_width,
                None,
            ),
            ContentBlock::ListItem { marker, .. } => (
                SizeClass::Body,
                TextRole::ListItem,
                geometry.margin_x + geometry.list_indent,
                (geometry.column_width - geometry.list_indent).max(1.0),
                match marker {
                    ListMarker::Bullet => Some(layout.bullet.clone()),
                    ListMarker::Ordered(n) => Some(format!("{n}.")),
                    ListMarker::Continuation => None,
                },
            ),
        };

        let metrics = provider.metrics(class);
        let text = match prefix {
            Some(p) => format!("{p} {}", block.text()),
            None => block.text().to_string(),
        };
        for line in wrap_text(&text, &metrics, width) {
            cursor.place(line.text(), x, &metrics, role);
        }
        if matches!(block, ContentBlock::Heading { .. }) {
            cursor.advance(geometry.heading_gap);
        }
    }
    cursor.plan.cursor_end = cursor.y;

    if let Some((natural_w, natural_h)) = input.image_size {
        let region = geometry.image_region;
        // The region's top moves down when a long title reaches into it.
        let top = (region.y0 as f32).max(title_bottom);
        let available_h = region.y1 as f32 - top;
        if let Some((w, h)) = fit_within(natural_w, natural_h, region.width() as f32, available_h)
        {
            let placement = ImagePlacement {
                x: region.x0 as f32,
                y: top,
                width: w,
                height: h,
            };
            cursor.plan.image = Some(placement);

            if let Some(caption) = input.caption {
                let caption_metrics = provider.metrics(SizeClass::Caption);
                cursor.y = placement.y + h as f32 + geometry.caption_gap;
                for line in wrap_text(caption, &caption_metrics, w as f32) {
                    cursor.place(line.text(), placement.x, &caption_metrics, TextRole::Caption);
                }
            }
        }
    }

    plan
}

#[cfg(test)]
#[path = "../../tests/unit/layout/slide.rs"]
mod tests;
