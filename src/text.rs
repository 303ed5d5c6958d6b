pub mod fonts;
pub mod metrics;

pub use fonts::{FontBook, TextBrushRgba8};
pub use metrics::{FixedAdvance, FontMetrics, MetricsProvider, SizeClass, TextMeasure};
