//! Explicit configuration for one studio process.
//!
//! Everything the compositor and assembler need (canvas size, type scale, geometry
//! fractions, fonts, encoder settings, the asset directory) lives here and is passed in by
//! value. All structs deserialize from JSON with per-field defaults, so a config file only
//! has to name what it overrides.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::{
    core::{Canvas, Fps, Rgba8},
    error::{SlideError, SlideResult},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub canvas: Canvas,
    pub layout: LayoutConfig,
    pub fonts: FontSource,
    pub encode: EncodeConfig,
    pub fetch: FetchConfig,
    /// Directory holding generated videos and per-call scratch directories.
    pub asset_dir: PathBuf,
    /// Worker threads for slide composition and segment preparation. `None` uses rayon
    /// defaults.
    pub threads: Option<usize>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            layout: LayoutConfig::default(),
            fonts: FontSource::default(),
            encode: EncodeConfig::default(),
            fetch: FetchConfig::default(),
            asset_dir: PathBuf::from("assets"),
            threads: None,
        }
    }
}

impl StudioConfig {
    pub fn from_json_file(path: &Path) -> SlideResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| SlideError::parse(format!("config '{}': {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SlideResult<()> {
        self.canvas.validate_for_video()?;
        self.layout.validate()?;
        self.encode.validate()?;
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(SlideError::validation("'threads' must be >= 1 when set"));
        }
        Ok(())
    }

    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }
}

/// What to do with body lines that run past the bottom margin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep drawing below the canvas; the overflow is simply not visible.
    #[default]
    Allow,
    /// Drop lines that would cross the bottom margin and report how many were dropped.
    Truncate,
}

/// Slide geometry and styling.
///
/// Fractions are relative to the canvas; pixel values are given at
/// [`Canvas::REFERENCE_HEIGHT`] and scaled with the canvas height.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub background: Rgba8,
    pub text_color: Rgba8,
    /// Left/right margin as a fraction of canvas width.
    pub margin_x_frac: f32,
    /// Top margin (title position) as a fraction of canvas height.
    pub margin_top_frac: f32,
    /// Bottom margin as a fraction of canvas height; only used by
    /// [`OverflowPolicy::Truncate`].
    pub margin_bottom_frac: f32,
    /// Share of the canvas width given to the text column (margins included).
    pub column_frac: f32,
    /// Top edge of the side image region as a fraction of canvas height.
    pub image_top_frac: f32,
    /// Height of the side image region as a fraction of canvas height.
    pub image_height_frac: f32,
    pub type_scale: TypeScale,
    /// Baseline-to-baseline distance as a multiple of the font size.
    pub line_pitch_ratio: f32,
    pub title_gap_px: f32,
    pub heading_gap_px: f32,
    pub list_indent_px: f32,
    pub caption_gap_px: f32,
    pub bullet: String,
    pub overflow: OverflowPolicy,
    /// Fail the slide instead of omitting an image that cannot be fetched or decoded.
    pub strict_images: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            background: Rgba8::WHITE,
            text_color: Rgba8::BLACK,
            margin_x_frac: 0.026,
            margin_top_frac: 0.046,
            margin_bottom_frac: 0.046,
            column_frac: 0.5,
            image_top_frac: 0.139,
            image_height_frac: 0.72,
            type_scale: TypeScale::default(),
            line_pitch_ratio: 4.0 / 3.0,
            title_gap_px: 20.0,
            heading_gap_px: 10.0,
            list_indent_px: 20.0,
            caption_gap_px: 12.0,
            bullet: "\u{2022}".to_string(),
            overflow: OverflowPolicy::Allow,
            strict_images: false,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> SlideResult<()> {
        let fracs = [
            ("margin_x_frac", self.margin_x_frac, 0.0, 0.25),
            ("margin_top_frac", self.margin_top_frac, 0.0, 0.5),
            ("margin_bottom_frac", self.margin_bottom_frac, 0.0, 0.5),
            ("column_frac", self.column_frac, 0.1, 1.0),
            ("image_top_frac", self.image_top_frac, 0.0, 0.9),
            ("image_height_frac", self.image_height_frac, 0.0, 1.0),
        ];
        for (name, v, lo, hi) in fracs {
            if !v.is_finite() || v < lo || v > hi {
                return Err(SlideError::validation(format!(
                    "layout.{name} must be within [{lo}, {hi}], got {v}"
                )));
            }
        }
        let px = [
            ("title_gap_px", self.title_gap_px),
            ("heading_gap_px", self.heading_gap_px),
            ("list_indent_px", self.list_indent_px),
            ("caption_gap_px", self.caption_gap_px),
        ];
        for (name, v) in px {
            if !v.is_finite() || v < 0.0 {
                return Err(SlideError::validation(format!(
                    "layout.{name} must be finite and >= 0"
                )));
            }
        }
        if !self.line_pitch_ratio.is_finite() || self.line_pitch_ratio < 1.0 {
            return Err(SlideError::validation(
                "layout.line_pitch_ratio must be finite and >= 1",
            ));
        }
        self.type_scale.validate()
    }
}

/// Font sizes in pixels at the reference canvas height.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TypeScale {
    pub title_px: f32,
    pub body_px: f32,
    pub caption_px: f32,
    /// Sizes for heading levels 1 through 6; must strictly decrease.
    pub heading_px: [f32; 6],
}

impl Default for TypeScale {
    fn default() -> Self {
        Self {
            title_px: 60.0,
            body_px: 30.0,
            caption_px: 24.0,
            heading_px: [45.0, 40.0, 35.0, 30.0, 25.0, 20.0],
        }
    }
}

impl TypeScale {
    pub fn validate(&self) -> SlideResult<()> {
        for (name, v) in [
            ("title_px", self.title_px),
            ("body_px", self.body_px),
            ("caption_px", self.caption_px),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(SlideError::validation(format!(
                    "type_scale.{name} must be finite and > 0"
                )));
            }
        }
        if self.heading_px.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SlideError::validation(
                "type_scale.heading_px entries must be finite and > 0",
            ));
        }
        if self.heading_px.windows(2).any(|w| w[1] >= w[0]) {
            return Err(SlideError::validation(
                "type_scale.heading_px must strictly decrease from level 1 to level 6",
            ));
        }
        Ok(())
    }
}

/// Where the slide face comes from. With neither field set the system sans-serif face is
/// used.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FontSource {
    /// TrueType/OpenType file to load.
    pub path: Option<PathBuf>,
    /// Installed family to look up when `path` is unset.
    pub family: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub fps: Fps,
    /// x264 constant rate factor.
    pub crf: u8,
    /// x264 preset name.
    pub preset: String,
    pub audio_sample_rate: u32,
    pub audio_bitrate_kbps: u32,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            crf: 23,
            preset: "veryfast".to_string(),
            audio_sample_rate: 48_000,
            audio_bitrate_kbps: 192,
        }
    }
}

impl EncodeConfig {
    pub fn validate(&self) -> SlideResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        if self.crf > 51 {
            return Err(SlideError::validation("encode.crf must be within 0..=51"));
        }
        if self.preset.trim().is_empty() {
            return Err(SlideError::validation("encode.preset must be non-empty"));
        }
        if self.audio_sample_rate == 0 {
            return Err(SlideError::validation(
                "encode.audio_sample_rate must be non-zero",
            ));
        }
        if self.audio_bitrate_kbps == 0 {
            return Err(SlideError::validation(
                "encode.audio_bitrate_kbps must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Remote image retrieval limits.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_bytes: 32 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        StudioConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: StudioConfig = serde_json::from_str(
            r#"{ "canvas": { "width": 1280, "height": 720 }, "encode": { "fps": { "num": 30, "den": 1 } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.canvas.width, 1280);
        assert_eq!(cfg.encode.fps.num, 30);
        assert_eq!(cfg.encode.crf, 23);
        assert_eq!(cfg.layout, LayoutConfig::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn heading_sizes_must_decrease() {
        let mut scale = TypeScale::default();
        scale.heading_px[3] = scale.heading_px[2];
        assert!(scale.validate().is_err());
    }

    #[test]
    fn out_of_range_fraction_is_rejected() {
        let layout = LayoutConfig {
            column_frac: 1.5,
            ..LayoutConfig::default()
        };
        let err = layout.validate().unwrap_err();
        assert!(err.to_string().contains("column_frac"));
    }

    #[test]
    fn zero_threads_is_rejected() {
        let cfg = StudioConfig {
            threads: Some(0),
            ..StudioConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_file_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studio.json");
        std::fs::write(&path, r#"{ "asset_dir": "/tmp/reels", "threads": 2 }"#).unwrap();
        let cfg = StudioConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.asset_dir, PathBuf::from("/tmp/reels"));
        assert_eq!(cfg.threads, Some(2));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            StudioConfig::from_json_file(&path),
            Err(SlideError::Parse(_))
        ));
    }
}
