use std::{
    borrow::Cow,
    collections::HashMap,
    path::Path,
    sync::{Mutex, RwLock},
};

use anyhow::Context as _;

use crate::{
    config::FontSource,
    foundation::error::{SlideError, SlideResult},
    text::metrics::TextMeasure,
};

/// Families tried, in order, when no explicit font is configured.
const FALLBACK_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "FreeSans",
];

/// Word caches are dropped wholesale past this many entries.
const MAX_CACHED_WORDS: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush colour used by Parley text layout.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

struct Shaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Shaper {
    fn layout(
        &mut self,
        family: &str,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family.to_string())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

/// The single face slides are set in, plus the shaping state and measurement caches
/// built around it.
///
/// Shared by every composition in the process. Width lookups hit a read-mostly cache
/// keyed by `(size, word)`; only cache misses take the shaping lock.
pub struct FontBook {
    family: String,
    font: vello_cpu::peniko::FontData,
    font_len: usize,
    shaper: Mutex<Shaper>,
    word_widths: RwLock<HashMap<(u32, String), f32>>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("family", &self.family)
            .field("font_bytes_len", &self.font_len)
            .field("face_index", &self.font.index)
            .finish()
    }
}

impl FontBook {
    /// Load the face described by `source`.
    pub fn load(source: &FontSource) -> SlideResult<Self> {
        if let Some(path) = source.path.as_deref() {
            return Self::from_file(path);
        }
        let (bytes, index) = system_face(source.family.as_deref())?;
        Self::from_bytes(bytes, index)
    }

    pub fn from_file(path: &Path) -> SlideResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        Self::from_bytes(bytes, 0)
    }

    pub fn from_bytes(font_bytes: Vec<u8>, face_index: u32) -> SlideResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            SlideError::validation("no font families registered from font bytes")
        })?;
        let family = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| SlideError::validation("registered font family has no name"))?
            .to_string();

        tracing::debug!(family = %family, bytes = font_bytes.len(), "loaded slide font");
        let font_len = font_bytes.len();
        Ok(Self {
            family,
            font: vello_cpu::peniko::FontData::new(
                vello_cpu::peniko::Blob::from(font_bytes),
                face_index,
            ),
            font_len,
            shaper: Mutex::new(Shaper {
                font_ctx,
                layout_ctx: parley::LayoutContext::new(),
            }),
            word_widths: RwLock::new(HashMap::new()),
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Glyph source for the rasterizer.
    pub fn font_data(&self) -> vello_cpu::peniko::FontData {
        self.font.clone()
    }

    /// Shape one line of text for painting.
    pub fn layout_line(
        &self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> SlideResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(SlideError::render("text size_px must be finite and > 0"));
        }
        let mut shaper = self
            .shaper
            .lock()
            .map_err(|_| SlideError::render("text shaper lock poisoned"))?;
        Ok(shaper.layout(&self.family, text, size_px, brush))
    }

    fn word_width(&self, word: &str, size_px: f32) -> f32 {
        let key = (size_px.to_bits(), word.to_string());
        if let Some(w) = self
            .word_widths
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return *w;
        }

        let width = {
            let mut shaper = self.shaper.lock().unwrap_or_else(|e| e.into_inner());
            shaper
                .layout(&self.family, word, size_px, TextBrushRgba8::default())
                .width()
        };

        let mut cache = self.word_widths.write().unwrap_or_else(|e| e.into_inner());
        if cache.len() >= MAX_CACHED_WORDS {
            cache.clear();
        }
        cache.insert(key, width);
        width
    }

    fn space_width(&self, size_px: f32) -> f32 {
        let pair = self.word_width("x x", size_px);
        let single = self.word_width("x", size_px);
        let space = pair - 2.0 * single;
        if space > 0.0 { space } else { size_px * 0.25 }
    }
}

impl TextMeasure for FontBook {
    /// Sum of per-word advances plus one space advance per separating space. Kerning across
    /// word boundaries is ignored, which keeps the measure monotonic and cacheable.
    fn advance(&self, text: &str, size_px: f32) -> f32 {
        let spaces = text.chars().filter(|c| *c == ' ').count();
        let words: f32 = text
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(|w| self.word_width(w, size_px))
            .sum();
        if spaces == 0 {
            words
        } else {
            words + spaces as f32 * self.space_width(size_px)
        }
    }
}

fn system_face(family: Option<&str>) -> SlideResult<(Vec<u8>, u32)> {
    use usvg::fontdb::{Database, Family, Query};

    let mut db = Database::new();
    db.load_system_fonts();

    let mut candidates: Vec<Family<'_>> = Vec::new();
    if let Some(name) = family {
        candidates.push(Family::Name(name));
    }
    candidates.push(Family::SansSerif);
    candidates.extend(FALLBACK_FAMILIES.iter().copied().map(Family::Name));

    let id = candidates
        .iter()
        .find_map(|fam| {
            db.query(&Query {
                families: std::slice::from_ref(fam),
                ..Query::default()
            })
        })
        .or_else(|| db.faces().next().map(|face| face.id))
        .ok_or_else(|| SlideError::validation("no usable system font found"))?;

    if let Some(name) = family
        && db
            .query(&Query {
                families: &[Family::Name(name)],
                ..Query::default()
            })
            .is_none()
    {
        tracing::warn!(family = name, "requested font family not installed; using a fallback");
    }

    db.with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| SlideError::validation("failed to read system font data"))
}
