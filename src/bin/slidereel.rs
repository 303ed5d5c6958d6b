use std::{
    fs::File,
    io::{BufReader, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slidereel", version)]
struct Cli {
    /// Studio configuration JSON. Fields left out keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the asset directory from the config.
    #[arg(long, global = true)]
    asset_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a single slide as a PNG.
    Slide(SlideArgs),
    /// Compose a deck and assemble it with narration into an MP4 (requires `ffmpeg` and
    /// `ffprobe` on PATH).
    Deck(DeckArgs),
    /// Copy a previously generated video out of the asset directory.
    Fetch(FetchArgs),
    /// Delete every generated video and scratch directory.
    Clear,
}

#[derive(Parser, Debug)]
struct SlideArgs {
    #[arg(long)]
    title: String,

    /// Markdown body given inline.
    #[arg(long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Markdown body read from a file.
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Image reference: http(s) URL, file:// URL, data URL, or local path.
    #[arg(long)]
    image_url: Option<String>,

    #[arg(long, requires = "image_url")]
    caption: Option<String>,

    /// Output PNG path.
    #[arg(long, required_unless_present_any = ["base64", "dry_run"])]
    out: Option<PathBuf>,

    /// Print the slide as JSON with a base64 PNG instead of writing a file.
    #[arg(long)]
    base64: bool,

    /// Print the computed layout as JSON without painting.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct DeckArgs {
    /// JSON array of slides (`title`, `body_markdown`, `image_url`, `image_caption`).
    #[arg(long)]
    slides: PathBuf,

    /// Narration file for each slide, in deck order. Repeat once per slide.
    #[arg(long = "audio", required = true)]
    audio: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
struct FetchArgs {
    #[arg(long)]
    id: String,

    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.asset_dir)?;
    match cli.cmd {
        Command::Slide(args) => cmd_slide(config, args),
        Command::Deck(args) => cmd_deck(config, args),
        Command::Fetch(args) => cmd_fetch(config, args),
        Command::Clear => cmd_clear(config),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(
    path: Option<&Path>,
    asset_dir: Option<PathBuf>,
) -> anyhow::Result<slidereel::StudioConfig> {
    let mut config = match path {
        Some(p) => slidereel::StudioConfig::from_json_file(p)?,
        None => slidereel::StudioConfig::default(),
    };
    if let Some(dir) = asset_dir {
        config = config.with_asset_dir(dir);
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context("write JSON to stdout")?;
    writeln!(out)?;
    Ok(())
}

fn cmd_slide(config: slidereel::StudioConfig, args: SlideArgs) -> anyhow::Result<()> {
    let body = match (&args.body, &args.body_file) {
        (Some(b), _) => b.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("read body '{}'", path.display()))?,
        (None, None) => String::new(),
    };
    let request = slidereel::SlideRequest {
        title: args.title,
        body_markdown: body,
        image_url: args.image_url,
        image_caption: args.caption,
    };

    let studio = slidereel::Studio::new(config)?;

    if args.dry_run {
        return print_json(&studio.plan_slide(&request)?);
    }

    if args.base64 {
        let image = studio.compose_slide(&request)?;
        print_json(&image)?;
        return Ok(());
    }

    let Some(out) = args.out else {
        anyhow::bail!("--out is required unless --base64 or --dry-run is given");
    };
    let composed = studio
        .compositor()
        .compose(
            &request.into_spec(studio.config().canvas),
            &slidereel::CancelToken::new(),
        )?;
    for warning in &composed.warnings {
        eprintln!("warning: {warning}");
    }
    composed.slide.write_png(&out)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_deck(config: slidereel::StudioConfig, args: DeckArgs) -> anyhow::Result<()> {
    let f = File::open(&args.slides)
        .with_context(|| format!("open slides '{}'", args.slides.display()))?;
    let requests: Vec<slidereel::SlideRequest> =
        serde_json::from_reader(BufReader::new(f)).context("parse slides JSON")?;
    let audio = args
        .audio
        .into_iter()
        .map(slidereel::AudioTrack::from_file)
        .collect();

    let studio = slidereel::Studio::new(config)?;
    let output = studio.assemble_deck(&requests, audio, &slidereel::CancelToken::new())?;
    for w in &output.warnings {
        eprintln!("warning: slide {}: {}", w.slide_index, w.warning);
    }
    print_json(&output)?;
    eprintln!("wrote {}", output.video_path.display());
    Ok(())
}

fn cmd_fetch(config: slidereel::StudioConfig, args: FetchArgs) -> anyhow::Result<()> {
    let store = slidereel::AssetStore::open(&config.asset_dir)?;
    let mut src = store.open_video(&args.id)?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let mut dst = File::create(&args.out)
        .with_context(|| format!("create '{}'", args.out.display()))?;
    std::io::copy(&mut src, &mut dst)
        .with_context(|| format!("copy video {} to '{}'", args.id, args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_clear(config: slidereel::StudioConfig) -> anyhow::Result<()> {
    let store = slidereel::AssetStore::open(&config.asset_dir)?;
    print_json(&store.clear()?)
}
