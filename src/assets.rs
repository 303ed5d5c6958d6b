pub mod decode;
pub mod source;
pub mod store;

use std::sync::Arc;

pub use decode::{DecodedImage, decode_image, sniff_audio_extension};
pub use source::{DefaultImageSource, ImageSource};
pub use store::{AssetStore, ClearReport, OutputSlot, VideoId};

/// An image resampled to its on-slide size, ready for painting.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
}
