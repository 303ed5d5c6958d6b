//! The asset directory: finished videos named by id, plus transient scratch directories.

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::error::{SlideError, SlideResult};

const VIDEO_EXT: &str = "mp4";
const PARTIAL_SUFFIX: &str = ".mp4.partial";
const SCRATCH_PREFIX: &str = ".work-";

/// Identifier of a stored video: a hyphenated UUID v4, also its file stem.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().hyphenated().to_string())
    }

    /// Accepts only canonical UUIDs, so an id can never name a path outside the store.
    pub fn parse(raw: &str) -> SlideResult<Self> {
        let id = uuid::Uuid::parse_str(raw.trim())
            .map_err(|_| SlideError::not_found(format!("video '{raw}'")))?;
        Ok(Self(id.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a new video is written before and after it is complete.
#[derive(Clone, Debug)]
pub struct OutputSlot {
    pub id: VideoId,
    pub partial: PathBuf,
    pub final_path: PathBuf,
}

impl OutputSlot {
    /// Move the finished partial file into place.
    pub fn commit(&self) -> SlideResult<()> {
        std::fs::rename(&self.partial, &self.final_path).with_context(|| {
            format!(
                "rename '{}' to '{}'",
                self.partial.display(),
                self.final_path.display()
            )
        })?;
        Ok(())
    }

    /// Remove whatever the encoder left behind. Missing files are fine.
    pub fn discard(&self) {
        if let Err(e) = std::fs::remove_file(&self.partial)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.partial.display(), error = %e, "failed to remove partial output");
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ClearReport {
    pub removed_videos: usize,
    pub removed_partials: usize,
    pub removed_scratch_dirs: usize,
}

/// Handle on one asset directory. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    /// Open (and create if needed) the directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> SlideResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create asset dir '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_path(&self, id: &VideoId) -> PathBuf {
        self.root.join(format!("{id}.{VIDEO_EXT}"))
    }

    /// Reserve a fresh id and its output paths.
    pub fn allocate(&self) -> OutputSlot {
        let id = VideoId::new_v4();
        OutputSlot {
            partial: self.root.join(format!("{id}{PARTIAL_SUFFIX}")),
            final_path: self.video_path(&id),
            id,
        }
    }

    /// Per-call scratch directory, removed when the returned guard drops.
    pub fn scratch_dir(&self) -> SlideResult<tempfile::TempDir> {
        // The root may have been cleared since `open`.
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create asset dir '{}'", self.root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.root)
            .with_context(|| format!("create scratch dir in '{}'", self.root.display()))?;
        Ok(dir)
    }

    /// Open a stored video for reading.
    pub fn open_video(&self, raw_id: &str) -> SlideResult<File> {
        let id = VideoId::parse(raw_id)?;
        let path = self.video_path(&id);
        match File::open(&path) {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SlideError::not_found(format!("video '{id}'")))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("open video '{}'", path.display()))
                .into()),
        }
    }

    /// Remove every video, partial output, and scratch directory this store owns.
    ///
    /// Other files in the directory are left alone. Running this while a deck is being
    /// assembled breaks that deck.
    #[tracing::instrument(level = "info", skip(self), fields(root = %self.root.display()))]
    pub fn clear(&self) -> SlideResult<ClearReport> {
        let mut report = ClearReport::default();
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("list asset dir '{}'", self.root.display()))
                    .into());
            }
        };

        for entry in entries {
            let entry = entry.context("read asset dir entry")?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().context("stat asset dir entry")?;

            if file_type.is_dir() && name.starts_with(SCRATCH_PREFIX) {
                remove(std::fs::remove_dir_all(&path), &path)?;
                report.removed_scratch_dirs += 1;
            } else if file_type.is_file() && name.ends_with(PARTIAL_SUFFIX) {
                remove(std::fs::remove_file(&path), &path)?;
                report.removed_partials += 1;
            } else if file_type.is_file() && is_video_name(&name) {
                remove(std::fs::remove_file(&path), &path)?;
                report.removed_videos += 1;
            }
        }

        tracing::info!(?report, "cleared asset dir");
        Ok(report)
    }
}

fn is_video_name(name: &str) -> bool {
    name.strip_suffix(".mp4")
        .is_some_and(|stem| uuid::Uuid::parse_str(stem).is_ok())
}

/// Entries removed concurrently by someone else count as removed.
fn remove(result: std::io::Result<()>, path: &Path) -> SlideResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)
            .context(format!("remove '{}'", path.display()))
            .into()),
    }
}
