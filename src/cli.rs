use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

use crate::config::{Settings, DEFAULT_AUDIO_FORMAT, DEFAULT_AUDIO_QUALITY, DEFAULT_OUTPUT_DIR};
use crate::db::DB;
use crate::downloader::{download_audio, DownloadError, INSTALL_HINT};
use crate::logging;
use crate::probe::{self, format_duration, TrackInfo};
use crate::tools::{ToolLocator, DEFAULT_FFMPEG_FALLBACK};

pub const USAGE: &str = "Usage: ytaudio <URL>";

#[derive(Parser, Debug)]
#[command(name = "ytaudio", version, about = "Extract audio from a video URL with yt-dlp")]
pub struct Cli {
    /// Video URL
    url: Option<String>,

    /// Directory the audio files are written to
    #[arg(short, long, env = "YTAUDIO_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Target audio format
    #[arg(long, env = "YTAUDIO_AUDIO_FORMAT", default_value = DEFAULT_AUDIO_FORMAT)]
    audio_format: String,

    /// yt-dlp quality selector (0 is best); empty to let yt-dlp decide
    #[arg(long, env = "YTAUDIO_AUDIO_QUALITY", default_value = DEFAULT_AUDIO_QUALITY)]
    audio_quality: String,

    /// Path to the yt-dlp executable
    #[arg(long = "yt-dlp", env = "YTAUDIO_YT_DLP", value_name = "PATH")]
    yt_dlp: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, env = "YTAUDIO_FFMPEG", value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// ffmpeg location used when it is not found on PATH
    #[arg(long, env = "YTAUDIO_FFMPEG_FALLBACK", value_name = "PATH", default_value = DEFAULT_FFMPEG_FALLBACK)]
    ffmpeg_fallback: PathBuf,

    /// Do not pass an ffmpeg location to yt-dlp
    #[arg(long)]
    no_ffmpeg: bool,

    /// Download whole playlists instead of the single video
    #[arg(long)]
    allow_playlist: bool,

    /// Do not embed metadata in the audio file
    #[arg(long)]
    no_embed_metadata: bool,

    /// Download history database
    #[arg(long, env = "YTAUDIO_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Do not record the download in the history
    #[arg(long)]
    no_history: bool,

    /// Show the most recent downloads and exit
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "20")]
    history: Option<usize>,

    /// Debug logging and full error traces
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            output_dir: self.output_dir.clone(),
            audio_format: self.audio_format.clone(),
            audio_quality: Some(self.audio_quality.clone()).filter(|q| !q.is_empty()),
            yt_dlp: self.yt_dlp.clone(),
            ffmpeg: self.ffmpeg.clone(),
            ffmpeg_fallback: self.ffmpeg_fallback.clone(),
            use_ffmpeg: !self.no_ffmpeg,
            no_playlist: !self.allow_playlist,
            embed_metadata: !self.no_embed_metadata,
            history_db: self.db.clone(),
            record_history: !self.no_history,
        }
    }

    /// The URL, unless missing or blank.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            println!("{err}");
            println!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(cli.verbose);
    let settings = cli.settings();

    if let Some(limit) = cli.history {
        return match show_history(&settings, limit) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                println!("[ERROR] {err:#}");
                ExitCode::FAILURE
            }
        };
    }

    let Some(url) = cli.url() else {
        println!("{USAGE}");
        return ExitCode::FAILURE;
    };

    match download(&settings, url) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, cli.verbose);
            ExitCode::FAILURE
        }
    }
}

fn download(settings: &Settings, url: &str) -> Result<(), DownloadError> {
    let request = settings.request(url, &ToolLocator::from_env())?;

    println!("Downloading: {url}");
    println!("Command: {}", request.command_line());

    let outcome = download_audio(&request)?;
    println!("[SUCCESS] Download completed successfully!");
    if !outcome.stdout.is_empty() {
        println!("Output:");
        println!("{}", outcome.stdout);
    }

    let tracks: Vec<TrackInfo> = outcome
        .files
        .iter()
        .map(|path| {
            probe::probe(path).unwrap_or_else(|err| {
                warn!("could not read {}: {err:#}", path.display());
                TrackInfo {
                    path: path.clone(),
                    ..Default::default()
                }
            })
        })
        .collect();

    for track in &tracks {
        match track.duration_seconds {
            Some(secs) => println!(
                "Saved: {} ({}, {})",
                track.path.display(),
                track.display_title(),
                format_duration(secs)
            ),
            None => println!("Saved: {} ({})", track.path.display(), track.display_title()),
        }
    }

    if settings.record_history && !tracks.is_empty() {
        if let Err(err) = record_history(settings, url, &tracks) {
            warn!("could not update download history: {err:#}");
        }
    }

    Ok(())
}

fn record_history(settings: &Settings, url: &str, tracks: &[TrackInfo]) -> anyhow::Result<()> {
    let path = settings
        .history_path()
        .ok_or_else(|| anyhow::anyhow!("no data directory available"))?;
    let db = DB::open(&path)?;
    for track in tracks {
        db.record(url, track)?;
    }
    Ok(())
}

fn show_history(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let path = settings
        .history_path()
        .ok_or_else(|| anyhow::anyhow!("no data directory available"))?;
    let db = DB::open(&path)?;
    let entries = db.recent(limit)?;

    if entries.is_empty() {
        println!("No downloads recorded");
        return Ok(());
    }
    println!("{} of {} downloads:", entries.len(), db.track_count()?);
    for entry in entries {
        let duration = entry.duration_seconds.map(format_duration).unwrap_or_else(|| "-".into());
        println!(
            "{:>8}  {}  {}",
            duration,
            entry.title.as_deref().unwrap_or(&entry.path),
            entry.url
        );
    }
    Ok(())
}

fn report_error(err: &DownloadError, verbose: bool) {
    match err {
        DownloadError::ToolNotFound { .. } => {
            println!("[ERROR] {err}");
            println!("{INSTALL_HINT}");
        }
        DownloadError::ExecutionFailed { stderr, stdout, .. } => {
            println!("[ERROR] {err}");
            if !stderr.is_empty() {
                println!("Error details:");
                println!("{stderr}");
            }
            if !stdout.is_empty() {
                println!("Output:");
                println!("{stdout}");
            }
        }
        DownloadError::Unexpected(inner) => {
            println!("[ERROR] Unexpected error: {inner:#}");
            if verbose {
                eprintln!("{inner:?}");
            }
        }
    }
}
