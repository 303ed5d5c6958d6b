use std::{collections::HashMap, io::Cursor};

use super::*;
use crate::{
    config::{FontSource, OverflowPolicy},
    layout::TextRole,
    text::FixedAdvance,
};

/// Serves canned bytes by reference; anything else is a fetch failure.
#[derive(Default)]
struct MapSource(HashMap<String, Vec<u8>>);

impl MapSource {
    fn with(mut self, reference: &str, bytes: Vec<u8>) -> Self {
        self.0.insert(reference.to_string(), bytes);
        self
    }
}

impl ImageSource for MapSource {
    fn fetch(&self, reference: &str, cancel: &CancelToken) -> SlideResult<Vec<u8>> {
        cancel.check()?;
        self.0
            .get(reference)
            .cloned()
            .ok_or_else(|| SlideError::asset_fetch(reference, "http status 404 Not Found"))
    }
}

fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn spec() -> SlideSpec {
    SlideSpec::new(
        "Attention",
        "Self-attention relates every token to every other token.\n\n- queries\n- keys\n- values",
    )
}

/// Holds every fetch until the token flips, like a server that never answers.
struct StallingSource;

impl ImageSource for StallingSource {
    fn fetch(&self, _reference: &str, cancel: &CancelToken) -> SlideResult<Vec<u8>> {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while std::time::Instant::now() < deadline {
            cancel.check()?;
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        Err(SlideError::asset_fetch("stalled", "timed out"))
    }
}

fn plan(spec: &SlideSpec, layout: &LayoutConfig, source: &MapSource) -> SlideResult<PlannedSlide> {
    prepare(spec, layout, source, &FixedAdvance::default(), &CancelToken::new()).map(|p| p.planned)
}

#[test]
fn cancel_during_image_fetch_fails_the_slide() {
    let spec = spec().with_image("https://example.invalid/slow.png", None);
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let result = prepare(
        &spec,
        &LayoutConfig::default(),
        &StallingSource,
        &FixedAdvance::default(),
        &cancel,
    );
    canceller.join().unwrap();

    // Not absorbed into an ImageOmitted warning, even without strict images.
    assert!(matches!(result, Err(SlideError::Cancelled)));
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn cancelled_token_stops_a_slide_before_any_fetch() {
    let source = MapSource::default().with("red.png", png(8, 8, [255, 0, 0, 255]));
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = prepare(
        &spec().with_image("red.png", None),
        &LayoutConfig::default(),
        &source,
        &FixedAdvance::default(),
        &cancel,
    );
    assert!(matches!(result, Err(SlideError::Cancelled)));
}

#[test]
fn unreachable_image_degrades_to_a_warning() {
    let spec = spec().with_image(
        "https://example.invalid/missing.png",
        Some("Figure 1".to_string()),
    );
    let planned = plan(&spec, &LayoutConfig::default(), &MapSource::default()).unwrap();

    assert!(planned.image_omitted());
    assert!(planned.plan.image.is_none());
    assert!(planned.plan.lines_with_role(TextRole::Caption).next().is_none());
    assert_eq!(
        planned.warnings,
        vec![
            SlideWarning::ImageOmitted {
                reference: "https://example.invalid/missing.png".to_string(),
                reason: "http status 404 Not Found".to_string(),
            },
            SlideWarning::CaptionWithoutImage,
        ]
    );
    // Text layout is unaffected by the missing image.
    let without = plan(&self::spec(), &LayoutConfig::default(), &MapSource::default()).unwrap();
    assert_eq!(planned.plan.lines, without.plan.lines);
}

#[test]
fn undecodable_image_degrades_to_a_warning() {
    let source = MapSource::default().with("bad.png", b"not an image".to_vec());
    let spec = spec().with_image("bad.png", None);
    let planned = plan(&spec, &LayoutConfig::default(), &source).unwrap();
    assert!(planned.image_omitted());
    assert_eq!(planned.warnings.len(), 1);
}

#[test]
fn strict_images_turn_failures_into_errors() {
    let layout = LayoutConfig {
        strict_images: true,
        ..LayoutConfig::default()
    };
    let spec = spec().with_image("missing.png", None);
    let err = plan(&spec, &layout, &MapSource::default())
        .err()
        .expect("strict fetch failure");
    assert!(matches!(err, SlideError::AssetFetch { .. }), "{err:?}");
    assert_eq!(err.status_code(), 502);
}

#[test]
fn decoded_image_is_placed_with_its_caption() {
    let source = MapSource::default().with("chart.png", png(300, 200, [0, 128, 0, 255]));
    let spec = spec().with_image("chart.png", Some("Accuracy by epoch".to_string()));
    let planned = plan(&spec, &LayoutConfig::default(), &source).unwrap();

    assert!(planned.warnings.is_empty(), "{:?}", planned.warnings);
    let img = planned.plan.image.expect("image placed");
    assert!((img.width as f32 / img.height as f32 - 1.5).abs() < 0.01);
    let caption: Vec<_> = planned.plan.lines_with_role(TextRole::Caption).collect();
    assert_eq!(caption.len(), 1);
    assert_eq!(caption[0].text, "Accuracy by epoch");
}

#[test]
fn blank_image_reference_and_caption_are_ignored() {
    let mut spec = spec();
    spec.image_url = Some("   ".to_string());
    spec.image_caption = Some(" ".to_string());
    let planned = plan(&spec, &LayoutConfig::default(), &MapSource::default()).unwrap();
    assert!(planned.warnings.is_empty());
    assert!(!planned.image_omitted());
}

#[test]
fn truncation_is_reported() {
    let layout = LayoutConfig {
        overflow: OverflowPolicy::Truncate,
        ..LayoutConfig::default()
    };
    let body = (0..80)
        .map(|i| format!("- item {i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let planned = plan(&SlideSpec::new("Long", body), &layout, &MapSource::default()).unwrap();
    let Some(SlideWarning::TextTruncated { dropped_lines }) = planned.warnings.last() else {
        panic!("expected truncation warning, got {:?}", planned.warnings);
    };
    assert_eq!(*dropped_lines, planned.plan.dropped_lines);
    assert!(*dropped_lines > 0);
}

#[test]
fn zero_canvas_is_rejected() {
    let spec = spec().with_canvas(Canvas {
        width: 0,
        height: 1080,
    });
    let err = plan(&spec, &LayoutConfig::default(), &MapSource::default())
        .err()
        .expect("invalid canvas");
    assert!(matches!(err, SlideError::Validation(_)));
}

#[test]
fn warnings_serialize_with_a_kind_tag() {
    let json = serde_json::to_value(SlideWarning::TextTruncated { dropped_lines: 3 }).unwrap();
    assert_eq!(json["kind"], "text_truncated");
    assert_eq!(json["dropped_lines"], 3);
}

fn system_compositor(source: MapSource) -> Option<Compositor> {
    match FontBook::load(&FontSource::default()) {
        Ok(book) => Some(Compositor::new(
            LayoutConfig::default(),
            Arc::new(book),
            Arc::new(source),
        )),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

#[test]
fn composed_slide_paints_background_text_and_image() {
    let source = MapSource::default().with("red.png", png(64, 64, [255, 0, 0, 255]));
    let Some(compositor) = system_compositor(source) else {
        return;
    };
    let canvas = Canvas {
        width: 960,
        height: 540,
    };
    let spec = spec().with_image("red.png", None).with_canvas(canvas);
    let composed = compositor.compose(&spec, &CancelToken::new()).unwrap();
    let slide = &composed.slide;

    assert_eq!((slide.width(), slide.height()), (960, 540));
    assert!(!composed.image_omitted());
    assert!(slide.as_rgba8().chunks_exact(4).all(|px| px[3] == 255));
    // Bottom-left corner is untouched background.
    assert_eq!(slide.pixel(2, 537), Some([255, 255, 255, 255]));

    let planned = compositor.plan(&spec, &CancelToken::new()).unwrap();
    let img = planned.plan.image.unwrap();
    let cx = (img.x + img.width as f32 / 2.0) as u32;
    let cy = (img.y + img.height as f32 / 2.0) as u32;
    let centre = slide.pixel(cx, cy).unwrap();
    assert!(centre[0] >= 250 && centre[1] <= 5 && centre[2] <= 5, "{centre:?}");

    let title = &planned.plan.lines[0];
    let band_top = title.y as u32;
    let band_bottom = (title.y + title.pitch) as u32;
    let inked = (band_top..band_bottom)
        .flat_map(|y| (0..canvas.width / 2).map(move |x| (x, y)))
        .filter(|&(x, y)| slide.pixel(x, y).is_some_and(|p| p[0] < 128))
        .count();
    assert!(inked > 0, "title band has no dark pixels");
}

#[test]
fn composing_twice_is_deterministic() {
    let Some(compositor) = system_compositor(MapSource::default()) else {
        return;
    };
    let spec = spec().with_canvas(Canvas {
        width: 640,
        height: 360,
    });
    let a = compositor.compose(&spec, &CancelToken::new()).unwrap();
    let b = compositor.compose(&spec, &CancelToken::new()).unwrap();
    assert_eq!(a.slide, b.slide);
}
