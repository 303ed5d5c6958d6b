pub mod compose;
pub mod paint;

use std::{io::Cursor, path::Path};

use anyhow::Context as _;
use base64::Engine as _;

use crate::foundation::error::{SlideError, SlideResult};

pub use compose::{ComposedSlide, Compositor, PlannedSlide, SlideSpec, SlideWarning};
pub use paint::paint_slide;

/// A finished slide: opaque RGBA8, row-major, tightly packed.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedSlide {
    width: u32,
    height: u32,
    rgba8: Vec<u8>,
}

impl std::fmt::Debug for RenderedSlide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedSlide")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl RenderedSlide {
    pub fn from_rgba8(width: u32, height: u32, rgba8: Vec<u8>) -> SlideResult<Self> {
        if width == 0 || height == 0 {
            return Err(SlideError::validation("slide width/height must be non-zero"));
        }
        if rgba8.len() != width as usize * height as usize * 4 {
            return Err(SlideError::validation(format!(
                "slide buffer holds {} bytes, expected {}x{}x4",
                rgba8.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8,
        })
    }

    /// A slide of one flat colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> SlideResult<Self> {
        let pixels = (width as usize).saturating_mul(height as usize);
        Self::from_rgba8(width, height, rgba.repeat(pixels))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgba8(&self) -> &[u8] {
        &self.rgba8
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba8.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn to_png(&self) -> SlideResult<Vec<u8>> {
        let mut buf = Vec::new();
        image::write_buffer_with_format(
            &mut Cursor::new(&mut buf),
            &self.rgba8,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .context("encode slide png")?;
        Ok(buf)
    }

    pub fn to_png_base64(&self) -> SlideResult<String> {
        Ok(base64::engine::general_purpose::STANDARD.encode(self.to_png()?))
    }

    pub fn write_png(&self, path: &Path) -> SlideResult<()> {
        crate::media::ensure_parent_dir(path)?;
        image::save_buffer_with_format(
            path,
            &self.rgba8,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}
