#![forbid(unsafe_code)]

pub mod assemble;
pub mod assets;
pub mod cancel;
pub mod config;
pub mod foundation;
pub mod layout;
pub mod markdown;
pub mod media;
pub mod render;
pub mod studio;
pub mod text;

pub use assemble::{AssembledVideo, Assembler, AudioTrack, SegmentSummary, Timeline};
pub use assets::{AssetStore, ClearReport, DefaultImageSource, ImageSource, VideoId};
pub use cancel::CancelToken;
pub use config::{
    EncodeConfig, FetchConfig, FontSource, LayoutConfig, OverflowPolicy, StudioConfig, TypeScale,
};
pub use foundation::core::{Canvas, Fps, FrameIndex, FrameRange, Rgba8};
pub use foundation::error::{ErrorReport, SlideError, SlideResult, Stage};
pub use layout::{SlidePlan, WrappedLine, wrap_text};
pub use markdown::{ContentBlock, ListMarker, parse_blocks};
pub use render::{ComposedSlide, Compositor, PlannedSlide, RenderedSlide, SlideSpec, SlideWarning};
pub use studio::{DeckOutput, DeckWarning, SlideImage, SlideRequest, Studio};
pub use text::{FixedAdvance, FontBook, FontMetrics, MetricsProvider, SizeClass, TextMeasure};
