//! The single ffmpeg invocation that muxes a whole deck.

use std::{
    ffi::OsString,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use crate::{
    assemble::timeline::Timeline,
    config::EncodeConfig,
    foundation::error::{SlideError, SlideResult},
};

/// On-disk inputs for one segment, in deck order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentInputs {
    pub slide_png: PathBuf,
    pub audio: PathBuf,
}

/// Filter graph for `segments` laid out by `timeline`.
///
/// Input `2i` is slide `i` looped as a still, input `2i + 1` its narration. Each still is
/// cut to exactly its frame span; each narration is resampled, padded with silence, and cut
/// to the same span, so the concatenated streams stay in sync segment by segment.
pub fn filter_graph(timeline: &Timeline, encode: &EncodeConfig) -> String {
    let fps = timeline.fps();
    let mut graph = String::new();
    let mut concat_inputs = String::new();

    for entry in timeline.entries() {
        let i = entry.index;
        let v_in = 2 * i;
        let a_in = 2 * i + 1;
        let _ = write!(
            graph,
            "[{v_in}:v]fps={}/{},trim=end_frame={},setpts=PTS-STARTPTS,format=yuv420p,setsar=1[v{i}];",
            fps.num,
            fps.den,
            entry.frame_count()
        );
        let _ = write!(
            graph,
            "[{a_in}:a]aformat=sample_rates={}:channel_layouts=stereo,apad,atrim=end={:.6},asetpts=PTS-STARTPTS[a{i}];",
            encode.audio_sample_rate,
            entry.span_secs(fps)
        );
        let _ = write!(concat_inputs, "[v{i}][a{i}]");
    }

    let _ = write!(
        graph,
        "{concat_inputs}concat=n={}:v=1:a=1[outv][outa]",
        timeline.len()
    );
    graph
}

/// Full ffmpeg argument list writing an MP4 to `out`.
pub fn ffmpeg_args(
    segments: &[SegmentInputs],
    timeline: &Timeline,
    encode: &EncodeConfig,
    out: &Path,
) -> SlideResult<Vec<OsString>> {
    if segments.len() != timeline.len() {
        return Err(SlideError::validation(format!(
            "{} segment inputs for a timeline of {}",
            segments.len(),
            timeline.len()
        )));
    }

    let fps = timeline.fps();
    let rate = format!("{}/{}", fps.num, fps.den);
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect();

    for seg in segments {
        args.extend(["-loop", "1", "-framerate", rate.as_str(), "-i"].map(OsString::from));
        args.push(seg.slide_png.clone().into_os_string());
        args.push("-i".into());
        args.push(seg.audio.clone().into_os_string());
    }

    let crf = encode.crf.to_string();
    let bitrate = format!("{}k", encode.audio_bitrate_kbps);
    let sample_rate = encode.audio_sample_rate.to_string();
    args.push("-filter_complex".into());
    args.push(filter_graph(timeline, encode).into());
    args.extend(
        [
            "-map",
            "[outv]",
            "-map",
            "[outa]",
            "-c:v",
            "libx264",
            "-preset",
            encode.preset.as_str(),
            "-crf",
            crf.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-r",
            rate.as_str(),
            "-c:a",
            "aac",
            "-b:a",
            bitrate.as_str(),
            "-ar",
            sample_rate.as_str(),
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ]
        .map(OsString::from),
    );
    args.push(out.as_os_str().to_os_string());
    Ok(args)
}
