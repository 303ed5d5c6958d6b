use super::*;
use crate::text::{FixedAdvance, FontMetrics, TextMeasure};

// 10px per character at size 20 with the default ratio.
fn metrics(measure: &dyn TextMeasure) -> FontMetrics<'_> {
    FontMetrics::new(measure, 20.0, 26.0)
}

fn texts(lines: &[WrappedLine]) -> Vec<String> {
    lines.iter().map(WrappedLine::text).collect()
}

#[test]
fn short_text_is_a_single_identical_line() {
    let measure = FixedAdvance::default();
    let m = metrics(&measure);
    let lines = wrap_text("fits easily", &m, 500.0);
    assert_eq!(texts(&lines), vec!["fits easily"]);
    assert_eq!(lines[0].word_count(), 2);
}

#[test]
fn greedy_packing_breaks_at_the_bound() {
    let measure = FixedAdvance::default();
    let m = metrics(&measure);
    // "aaa bbb" is 70px; "aaa bbb ccc" would be 110px.
    let lines = wrap_text("aaa bbb ccc ddd", &m, 100.0);
    assert_eq!(texts(&lines), vec!["aaa bbb", "ccc ddd"]);
}

#[test]
fn exact_fit_is_kept_on_the_line() {
    let measure = FixedAdvance::default();
    let m = metrics(&measure);
    let lines = wrap_text("aaaa bbbbb", &m, 100.0);
    assert_eq!(texts(&lines), vec!["aaaa bbbbb"]);
}

#[test]
fn overlong_word_sits_alone_without_splitting() {
    let measure = FixedAdvance::default();
    let m = metrics(&measure);
    let lines = wrap_text("a incomprehensibilities b", &m, 60.0);
    assert_eq!(texts(&lines), vec!["a", "incomprehensibilities", "b"]);
    assert!(m.width(&lines[1].text()) > 60.0);
    assert_eq!(lines[1].word_count(), 1);
}

#[test]
fn every_multi_word_line_respects_the_bound() {
    let measure = FixedAdvance { ratio: 0.55 };
    let m = metrics(&measure);
    let text = "Attention mechanisms let the model weigh every token against every \
                other token, which is quadratic in sequence length but embarrassingly \
                parallel on modern accelerators";
    for max in [40.0, 90.0, 150.0, 333.0, 800.0] {
        let lines = wrap_text(text, &m, max);
        assert!(!lines.is_empty());
        for line in &lines {
            assert!(
                line.word_count() == 1 || m.width(&line.text()) <= max,
                "line {:?} exceeds {max}",
                line.text()
            );
        }
        let rejoined: Vec<String> = lines.iter().flat_map(|l| l.words().to_vec()).collect();
        let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        assert_eq!(rejoined, original);
    }
}

#[test]
fn whitespace_is_normalised_and_blank_input_is_empty() {
    let measure = FixedAdvance::default();
    let m = metrics(&measure);
    assert!(wrap_text("", &m, 100.0).is_empty());
    assert!(wrap_text("  \t\n ", &m, 100.0).is_empty());
    let lines = wrap_text("  spaced\n\tout  ", &m, 500.0);
    assert_eq!(texts(&lines), vec!["spaced out"]);
}

#[test]
fn wrapping_is_stable_across_runs() {
    let measure = FixedAdvance::default();
    let m = metrics(&measure);
    let text = "one two three four five six seven eight nine ten";
    assert_eq!(wrap_text(text, &m, 120.0), wrap_text(text, &m, 120.0));
}
