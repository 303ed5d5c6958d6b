pub mod slide;
pub mod wrap;

pub use slide::{
    ImagePlacement, LayoutInput, PlacedLine, SlideGeometry, SlidePlan, TextRole, fit_within,
    layout_slide,
};
pub use wrap::{WrappedLine, wrap_text};
