use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use clap::Parser;
use eframe::egui;
use tracing::info;

use annotate_video::app::{AppOptions, VideoAnnotateApp};
use annotate_video::config::{Settings, SETTINGS_FILE_NAME};
use annotate_video::logging;
use annotate_video::model::VideoId;
use annotate_video::store::{AnnotationApi, HttpStore, LocalStore};

#[derive(Parser, Debug)]
#[command(name = "annotate-video", version)]
struct Cli {
    /// Settings file (JSON).
    #[arg(long, default_value = SETTINGS_FILE_NAME)]
    config: PathBuf,

    /// Video whose annotations are edited.
    #[arg(long, default_value_t = 1)]
    video_id: i64,

    /// Annotation service base URL, e.g. http://localhost:5000/api.
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token for the annotation service.
    #[arg(long)]
    token: Option<String>,

    /// Local annotation file, used when no service is configured.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Still frame shown in place of the video.
    #[arg(long)]
    poster: Option<PathBuf>,

    /// Video length in seconds.
    #[arg(long, default_value_t = 60.0)]
    duration: f64,

    /// Frame size as WIDTHxHEIGHT when there is no poster.
    #[arg(long, value_parser = parse_size)]
    size: Option<(u32, u32)>,

    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err("frame size must be non-zero".into());
    }
    Ok((w, h))
}

fn open_store(cli: &Cli, settings: &Settings) -> anyhow::Result<Arc<dyn AnnotationApi>> {
    if let Some(url) = &settings.api_url {
        info!(url = %url, "using annotation service");
        let store = HttpStore::new(url.clone(), settings.api_token.clone())?;
        return Ok(Arc::new(store));
    }
    let path = match (&settings.store_path, &cli.poster) {
        (Some(path), _) => path.clone(),
        (None, Some(poster)) => LocalStore::sidecar_path(poster),
        (None, None) => PathBuf::from("annotations.json"),
    };
    info!(path = %path.display(), "using local annotation file");
    Ok(Arc::new(LocalStore::open(path)?))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)?;
    if cli.api_url.is_some() {
        settings.api_url = cli.api_url.clone();
    }
    if cli.token.is_some() {
        settings.api_token = cli.token.clone();
    }
    if cli.store.is_some() {
        settings.store_path = cli.store.clone();
    }
    settings.debug_logging |= cli.debug;
    logging::init(settings.debug_logging);

    if !cli.duration.is_finite() || cli.duration <= 0.0 {
        return Err(anyhow!("--duration must be a positive number of seconds"));
    }
    let api = open_store(&cli, &settings).context("open annotation store")?;

    let name = cli
        .poster
        .as_ref()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("video {}", cli.video_id));
    let title = format!("annotate-video: {name}");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };

    let app_options = AppOptions {
        title: title.clone(),
        video: VideoId(cli.video_id),
        api,
        settings,
        poster: cli.poster.clone(),
        duration: cli.duration,
        frame_size: cli.size,
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(VideoAnnotateApp::new(app_options)))),
    )
    .map_err(|e| anyhow!("eframe: {e}"))
}
