use std::sync::Arc;

use anyhow::Context;

use crate::{assets::PreparedImage, foundation::error::SlideResult};

/// Straight-alpha RGBA8 image as decoded from its container.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    rgba: image::RgbaImage,
}

impl DecodedImage {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resample to exactly `width x height` and premultiply for painting.
    pub fn prepare(&self, width: u32, height: u32) -> PreparedImage {
        let resized = if (width, height) == (self.width, self.height) {
            self.rgba.clone()
        } else {
            image::imageops::resize(
                &self.rgba,
                width,
                height,
                image::imageops::FilterType::Lanczos3,
            )
        };

        let mut rgba8_premul = resized.into_raw();
        premultiply_rgba8_in_place(&mut rgba8_premul);
        PreparedImage {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        }
    }
}

pub fn decode_image(bytes: &[u8]) -> SlideResult<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        rgba,
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Guess an audio container extension from its leading bytes.
///
/// ffmpeg probes content anyway; the extension only has to be plausible so the demuxer
/// picks the right parser on the first try.
pub fn sniff_audio_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [b'I', b'D', b'3', ..] => Some("mp3"),
        [0xFF, b, ..] if b & 0xE0 == 0xE0 && b & 0x06 != 0 => Some("mp3"),
        [0xFF, b, ..] if b & 0xF6 == 0xF0 => Some("aac"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some("wav"),
        [b'O', b'g', b'g', b'S', ..] => Some("ogg"),
        [b'f', b'L', b'a', b'C', ..] => Some("flac"),
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some("m4a"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("webm"),
        _ => None,
    }
}
