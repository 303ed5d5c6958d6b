use crate::text::FontMetrics;

/// One renderable line produced by [`wrap_text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedLine {
    words: Vec<String>,
}

impl WrappedLine {
    fn start(word: &str) -> Self {
        Self {
            words: vec![word.to_string()],
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

/// Greedy word packing.
///
/// Each word is tentatively appended to the current line with one separating space and
/// kept there when the measured line still fits `max_width`; otherwise it opens a new
/// line. A word wider than `max_width` sits alone on its line and is never split.
pub fn wrap_text(text: &str, metrics: &FontMetrics<'_>, max_width: f32) -> Vec<WrappedLine> {
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    let mut current = WrappedLine::start(first);
    let mut current_text = first.to_string();

    for word in words {
        let candidate = format!("{current_text} {word}");
        if metrics.width(&candidate) <= max_width {
            current.words.push(word.to_string());
            current_text = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, WrappedLine::start(word)));
            current_text = word.to_string();
        }
    }
    lines.push(current);
    lines
}

#[cfg(test)]
#[path = "../../tests/unit/layout/wrap.rs"]
mod tests;
