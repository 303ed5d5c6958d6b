//! Rasterize a [`SlidePlan`] with vello_cpu.

use std::sync::Arc;

use crate::{
    assets::PreparedImage,
    foundation::{
        core::Rgba8,
        error::{SlideError, SlideResult},
    },
    layout::SlidePlan,
    render::RenderedSlide,
    text::{FontBook, TextBrushRgba8},
};

/// Paint `plan` onto a fresh canvas filled with `background`.
///
/// `image` must already be resampled to the plan's image placement size.
pub fn paint_slide(
    plan: &SlidePlan,
    image: Option<&PreparedImage>,
    fonts: &FontBook,
    background: Rgba8,
    text_color: Rgba8,
) -> SlideResult<RenderedSlide> {
    let width: u16 = plan
        .canvas
        .width
        .try_into()
        .map_err(|_| SlideError::render("canvas width exceeds u16"))?;
    let height: u16 = plan
        .canvas
        .height
        .try_into()
        .map_err(|_| SlideError::render("canvas height exceeds u16"))?;

    let mut pixmap = vello_cpu::Pixmap::new(width, height);
    clear_pixmap(&mut pixmap, background.premultiplied());

    let mut ctx = vello_cpu::RenderContext::new(width, height);

    if let (Some(placement), Some(img)) = (plan.image, image) {
        if (img.width, img.height) != (placement.width, placement.height) {
            return Err(SlideError::render(format!(
                "prepared image is {}x{}, placement expects {}x{}",
                img.width, img.height, placement.width, placement.height
            )));
        }
        let pixmap = image_premul_bytes_to_pixmap(img.rgba8_premul.as_slice(), img.width, img.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        let transform =
            vello_cpu::kurbo::Affine::translate((f64::from(placement.x), f64::from(placement.y)));
        ctx.set_transform(transform);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(img.width),
            f64::from(img.height),
        ));
    }

    let font = fonts.font_data();
    let brush = TextBrushRgba8 {
        r: text_color.r,
        g: text_color.g,
        b: text_color.b,
        a: text_color.a,
    };
    for line in &plan.lines {
        // Lines pushed below the canvas by an overflowing body paint nothing.
        if line.y >= plan.canvas.height as f32 {
            continue;
        }
        let layout = fonts.layout_line(&line.text, line.size_px, brush)?;
        let leading = ((line.pitch - layout.height()) * 0.5).max(0.0);
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((
            f64::from(line.x),
            f64::from(line.y + leading),
        )));

        for parley_line in layout.lines() {
            for item in parley_line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };

                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));

                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }

    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);

    let mut rgba8 = vec![0u8; usize::from(width) * usize::from(height) * 4];
    flatten_to_opaque_rgba8(
        &mut rgba8,
        pixmap.data_as_u8_slice(),
        [background.r, background.g, background.b, 255],
    )?;
    RenderedSlide::from_rgba8(u32::from(width), u32::from(height), rgba8)
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    let data = pixmap.data_as_u8_slice_mut();
    for px in data.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> SlideResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| SlideError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| SlideError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(SlideError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

/// Composite premultiplied pixels over an opaque backdrop so every output pixel is opaque.
fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8], bg_rgba: [u8; 4]) -> SlideResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(SlideError::render(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (s[0] as u16 + mul_div255(bg_r, inv)).min(255) as u8;
        d[1] = (s[1] as u16 + mul_div255(bg_g, inv)).min(255) as u8;
        d[2] = (s[2] as u16 + mul_div255(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
