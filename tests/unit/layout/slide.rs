use super::*;
use crate::markdown::parse_blocks;
use crate::text::{FixedAdvance, TextMeasure};

fn plan_for(
    measure: &dyn TextMeasure,
    layout: &LayoutConfig,
    canvas: Canvas,
    title: &str,
    body: &str,
    image_size: Option<(u32, u32)>,
    caption: Option<&str>,
) -> SlidePlan {
    let blocks = parse_blocks(body);
    let provider = MetricsProvider::new(measure, layout, canvas);
    let geometry = SlideGeometry::new(canvas, layout);
    layout_slide(
        LayoutInput {
            title,
            blocks: &blocks,
            image_size,
            caption,
        },
        &provider,
        layout,
        &geometry,
    )
}

const BODY: &str = "# Background\n\nTransformers replaced recurrence with attention, which \
lets every position look at every other position in a single step.\n\n\
- parallel training\n- long-range context\n\n1. encode\n2. decode\n\n### Caveat\n\n\
Memory grows quadratically with sequence length.";

#[test]
fn title_sits_at_the_top_margin() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let canvas = Canvas::default();
    let plan = plan_for(&measure, &layout, canvas, "Intro", BODY, None, None);

    let geometry = SlideGeometry::new(canvas, &layout);
    let first = &plan.lines[0];
    assert_eq!(first.role, TextRole::Title);
    assert_eq!(first.text, "Intro");
    assert_eq!(first.y, geometry.title_top);
    assert_eq!(first.x, geometry.margin_x);
}

#[test]
fn lines_advance_monotonically_without_overlap() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let plan = plan_for(
        &measure,
        &layout,
        Canvas::default(),
        "A Rather Long Lecture Title That Needs More Than One Line On The Slide",
        BODY,
        None,
        None,
    );

    for pair in plan.lines.windows(2) {
        assert!(
            pair[1].y >= pair[0].y + pair[0].pitch - 1e-3,
            "{:?} overlaps {:?}",
            pair[1],
            pair[0]
        );
    }
    assert!(plan.cursor_end >= plan.lines.last().unwrap().y);
    assert_eq!(plan.dropped_lines, 0);
}

#[test]
fn body_lines_stay_inside_the_column() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let canvas = Canvas::default();
    let geometry = SlideGeometry::new(canvas, &layout);
    let plan = plan_for(&measure, &layout, canvas, "Intro", BODY, None, None);

    let column_right = geometry.margin_x + geometry.column_width;
    for line in plan.lines.iter().filter(|l| l.role != TextRole::Title) {
        let width = measure.advance(&line.text, line.size_px);
        let single_word = !line.text.contains(' ');
        assert!(
            single_word || line.x + width <= column_right + 1e-3,
            "{:?} runs past the column",
            line.text
        );
    }
}

#[test]
fn list_items_are_indented_and_marked() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let plan = plan_for(&measure, &layout, Canvas::default(), "Intro", BODY, None, None);

    let para_x = plan.lines_with_role(TextRole::Paragraph).next().unwrap().x;
    let items: Vec<&PlacedLine> = plan.lines_with_role(TextRole::ListItem).collect();
    assert!(items.iter().all(|l| l.x > para_x));
    let texts: Vec<&str> = items.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "\u{2022} parallel training",
            "\u{2022} long-range context",
            "1. encode",
            "2. decode"
        ]
    );
}

#[test]
fn item_continuation_keeps_the_item_indent_without_a_marker() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let body = "- outer\n  - inner\n\n  tail of outer\n- last\n";
    let plan = plan_for(&measure, &layout, Canvas::default(), "Intro", body, None, None);

    let items: Vec<&PlacedLine> = plan.lines_with_role(TextRole::ListItem).collect();
    let texts: Vec<&str> = items.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "\u{2022} outer",
            "\u{2022} inner",
            "tail of outer",
            "\u{2022} last"
        ]
    );
    assert!(items.iter().all(|l| l.x == items[0].x));
    assert_eq!(plan.lines_with_role(TextRole::Paragraph).count(), 0);
}

#[test]
fn heading_sizes_shrink_with_level_and_add_a_gap() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let plan = plan_for(&measure, &layout, Canvas::default(), "", BODY, None, None);

    let h1 = plan.lines_with_role(TextRole::Heading(1)).next().unwrap();
    let h3 = plan.lines_with_role(TextRole::Heading(3)).next().unwrap();
    assert!(h1.size_px > h3.size_px);

    let idx = plan.lines.iter().position(|l| l == h1).unwrap();
    let next = &plan.lines[idx + 1];
    let geometry = SlideGeometry::new(Canvas::default(), &layout);
    assert!((next.y - (h1.y + h1.pitch + geometry.heading_gap)).abs() < 0.01);
}

#[test]
fn empty_title_starts_body_at_the_top_margin() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let plan = plan_for(&measure, &layout, Canvas::default(), "   ", "Just text.", None, None);
    let geometry = SlideGeometry::new(Canvas::default(), &layout);
    assert_eq!(plan.lines.len(), 1);
    assert_eq!(plan.lines[0].y, geometry.title_top);
}

#[test]
fn cursor_advances_by_line_count_times_pitch() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let plan = plan_for(
        &measure,
        &layout,
        Canvas::default(),
        "T",
        "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron \
         pi rho sigma tau upsilon phi chi psi omega",
        None,
        None,
    );
    let body: Vec<&PlacedLine> = plan.lines_with_role(TextRole::Paragraph).collect();
    assert!(body.len() > 1);
    let first = body[0];
    let expected_end = first.y + body.len() as f32 * first.pitch;
    assert!((plan.cursor_end - expected_end).abs() < 0.01);
}

#[test]
fn image_fits_region_and_keeps_aspect_ratio() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let canvas = Canvas::default();
    let geometry = SlideGeometry::new(canvas, &layout);
    let plan = plan_for(
        &measure,
        &layout,
        canvas,
        "Intro",
        "Body.",
        Some((4000, 1000)),
        Some("Figure 1: a very wide diagram with a caption long enough to wrap twice over"),
    );

    let img = plan.image.expect("image placed");
    let region = geometry.image_region;
    assert_eq!(img.x, region.x0 as f32);
    assert!(img.x + img.width as f32 <= region.x1 as f32 + 1.0);
    assert!(img.y + img.height as f32 <= region.y1 as f32 + 1.0);
    let ratio = img.width as f32 / img.height as f32;
    assert!((ratio - 4.0).abs() < 0.05, "aspect ratio drifted to {ratio}");

    let captions: Vec<&PlacedLine> = plan.lines_with_role(TextRole::Caption).collect();
    assert!(captions.len() > 1);
    for line in &captions {
        assert!(line.y >= img.y + img.height as f32);
        assert_eq!(line.x, img.x);
        let single_word = !line.text.contains(' ');
        assert!(single_word || measure.advance(&line.text, line.size_px) <= img.width as f32);
    }
}

#[test]
fn text_column_and_image_region_do_not_overlap() {
    let layout = LayoutConfig::default();
    for canvas in [
        Canvas::default(),
        Canvas {
            width: 1280,
            height: 720,
        },
        Canvas {
            width: 640,
            height: 360,
        },
    ] {
        let g = SlideGeometry::new(canvas, &layout);
        assert!(g.margin_x + g.column_width < g.image_region.x0 as f32);
        assert!(g.image_region.x1 as f32 <= canvas.width as f32);
    }
}

#[test]
fn geometry_scales_with_canvas() {
    let measure = FixedAdvance::default();
    let layout = LayoutConfig::default();
    let full = plan_for(&measure, &layout, Canvas::default(), "Intro", BODY, None, None);
    let half = plan_for(
        &measure,
        &layout,
        Canvas {
            width: 960,
            height: 540,
        },
        "Intro",
        BODY,
        None,
        None,
    );
    assert_eq!(full.lines.len(), half.lines.len());
    for (a, b) in full.lines.iter().zip(&half.lines) {
        assert_eq!(a.text, b.text);
        assert!((a.y * 0.5 - b.y).abs() < 0.5);
        assert!((a.x * 0.5 - b.x).abs() < 0.5);
    }
}

#[test]
fn overflow_is_kept_by_default_and_truncated_on_request() {
    let measure = FixedAdvance::default();
    let long_body = (0..60)
        .map(|i| format!("- point number {i}"))
        .collect::<Vec<_>>()
        .join("\n");

    let allow = LayoutConfig::default();
    let plan = plan_for(&measure, &allow, Canvas::default(), "Overflow", &long_body, None, None);
    assert_eq!(plan.dropped_lines, 0);
    assert!(plan.lines.iter().any(|l| l.y > 1080.0));

    let truncate = LayoutConfig {
        overflow: OverflowPolicy::Truncate,
        ..LayoutConfig::default()
    };
    let geometry = SlideGeometry::new(Canvas::default(), &truncate);
    let plan = plan_for(
        &measure,
        &truncate,
        Canvas::default(),
        "Overflow",
        &long_body,
        None,
        None,
    );
    assert!(plan.dropped_lines > 0);
    assert!(
        plan.lines
            .iter()
            .all(|l| l.y + l.pitch <= geometry.bottom_limit + 1e-3)
    );
    assert_eq!(plan.lines.len() + plan.dropped_lines, 61);
}

#[test]
fn fit_within_preserves_ratio_and_rejects_degenerate_boxes() {
    assert_eq!(fit_within(200, 100, 100.0, 100.0), Some((100, 50)));
    assert_eq!(fit_within(100, 400, 300.0, 200.0), Some((50, 200)));
    assert_eq!(fit_within(10, 10, 100.0, 50.0), Some((50, 50)));
    assert_eq!(fit_within(0, 10, 100.0, 100.0), None);
    assert_eq!(fit_within(10, 10, 0.5, 100.0), None);
}
