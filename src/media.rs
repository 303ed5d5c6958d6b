//! System `ffmpeg` / `ffprobe` process helpers.
//!
//! The system binaries are used rather than native bindings, so no FFmpeg development
//! headers are needed to build.

use std::{
    ffi::OsString,
    io::Read as _,
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

use crate::{
    cancel::CancelToken,
    foundation::error::{SlideError, SlideResult},
};

/// Keep at most this much ffmpeg stderr for error messages.
const STDERR_TAIL_BYTES: usize = 8 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(25);

fn tool_runs(name: &str) -> bool {
    Command::new(name)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    tool_runs("ffprobe")
}

/// Both binaries are needed to assemble a deck.
pub fn ffmpeg_tools_available() -> bool {
    is_ffmpeg_on_path() && is_ffprobe_on_path()
}

pub fn ensure_parent_dir(path: &Path) -> SlideResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

impl ProbeOut {
    /// Container duration, falling back to the longest audio stream.
    fn audio_duration_secs(&self) -> Option<f64> {
        let parse = |s: &Option<String>| s.as_deref().and_then(|d| d.trim().parse::<f64>().ok());
        self.format
            .as_ref()
            .and_then(|f| parse(&f.duration))
            .filter(|d| d.is_finite() && *d > 0.0)
            .or_else(|| {
                self.streams
                    .iter()
                    .filter(|s| s.codec_type.as_deref() == Some("audio"))
                    .filter_map(|s| parse(&s.duration))
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .reduce(f64::max)
            })
    }
}

/// Duration in seconds of the media at `path`. Zero or unknown durations are errors.
pub fn probe_duration_secs(path: &Path) -> SlideResult<f64> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| SlideError::probe(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(SlideError::probe(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| SlideError::probe(format!("ffprobe json parse failed: {e}")))?;
    parsed.audio_duration_secs().ok_or_else(|| {
        SlideError::probe(format!(
            "'{}' has zero or unknown duration",
            path.display()
        ))
    })
}

/// Run ffmpeg to completion with `args`, killing it if `cancel` fires.
///
/// stderr is drained on a helper thread so a chatty ffmpeg can never block on a full pipe;
/// its tail is folded into the error on failure.
pub fn run_ffmpeg(args: &[OsString], cancel: &CancelToken) -> SlideResult<()> {
    cancel.check()?;

    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            SlideError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| SlideError::encode("failed to open ffmpeg stderr (unexpected)"))?;
    let drain = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = std::io::BufReader::new(stderr).read_to_end(&mut buf);
        let start = buf.len().saturating_sub(STDERR_TAIL_BYTES);
        String::from_utf8_lossy(&buf[start..]).into_owned()
    });

    let status = loop {
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            let _ = drain.join();
            tracing::info!("ffmpeg killed on cancellation");
            return Err(SlideError::Cancelled);
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SlideError::encode(format!(
                    "failed to wait for ffmpeg to finish: {e}"
                )));
            }
        }
    };

    let stderr = drain.join().unwrap_or_default();
    if !status.success() {
        return Err(SlideError::encode(format!(
            "ffmpeg exited with status {status}: {}",
            stderr.trim()
        )));
    }
    Ok(())
}
