//! Rustcutter - video and fragment downloader
//!
//! Queues full videos or time-bounded fragments, negotiates a format with
//! yt-dlp and trims with ffmpeg. This binary drives the backend headlessly.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rustcutter::backend::{BackendActor, BackendCommand, BackendEvent};
use rustcutter::format::{AudioBitrate, QualityTier};
use rustcutter::queue::{QueueEvent, RunOutcome, TaskRequest, TaskState, TimeRange};
use rustcutter::utils::{parse_timecode, platform, AppSettings, CookieSource};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(name = "rustcutter", version, about = "Download videos or fragments of them")]
struct Args {
    /// Media URLs, processed in order
    urls: Vec<String>,

    /// Fragment start (SS, MM:SS or HH:MM:SS)
    #[arg(long, requires = "end")]
    start: Option<String>,

    /// Fragment end (SS, MM:SS or HH:MM:SS)
    #[arg(long, requires = "start")]
    end: Option<String>,

    /// best, 1080p, 720p or audio
    #[arg(short, long, default_value = "best")]
    quality: QualityTier,

    /// Keep the downloaded container instead of converting to mp4
    #[arg(long)]
    no_convert: bool,

    /// auto, 128, 192 or 320
    #[arg(short, long)]
    bitrate: Option<AudioBitrate>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Browser to take cookies from (chrome, edge, firefox, opera, yandex)
    #[arg(long)]
    cookies_from: Option<CookieSource>,

    /// Ignore the system proxy
    #[arg(long)]
    no_proxy: bool,

    /// JavaScript runtime for the extractor (deno, node, ...)
    #[arg(long)]
    js_runtime: Option<String>,

    /// Settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_config: bool,

    /// Update yt-dlp and exit
    #[arg(long)]
    update_core: bool,
}

impl Args {
    fn apply_to(&self, settings: &mut AppSettings) {
        if let Some(dir) = &self.output {
            settings.download_dir = dir.clone();
        }
        if let Some(source) = self.cookies_from {
            settings.cookie_source = source;
        }
        if self.no_proxy {
            settings.proxy_disabled = true;
        }
        if let Some(runtime) = &self.js_runtime {
            settings.js_runtime = Some(runtime.clone());
        }
        if let Some(bitrate) = self.bitrate {
            settings.default_audio_bitrate = bitrate;
        }
        settings.normalize();
    }

    fn range(&self) -> Result<Option<TimeRange>> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => {
                let range = TimeRange::new(parse_timecode(start)?, parse_timecode(end)?)?;
                Ok(Some(range))
            }
            _ => Ok(None),
        }
    }
}

fn init_logging(settings: &AppSettings) -> Result<()> {
    let stderr = std::io::stderr.with_max_level(Level::WARN);

    if !settings.logging_enabled {
        tracing_subscriber::fmt().with_writer(stderr).init();
        return Ok(());
    }

    let dir = platform::log_dir();
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("rustcutter.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_ansi(false)
        .with_writer(stderr.and(Mutex::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings_path = args.config.clone().unwrap_or_else(platform::settings_path);
    let mut settings = AppSettings::load(&settings_path)?;
    args.apply_to(&mut settings);
    init_logging(&settings)?;

    if args.save_config {
        settings.save(&settings_path)?;
    }

    let range = args.range()?;
    if args.urls.is_empty() && !args.update_core {
        if args.save_config {
            return Ok(());
        }
        bail!("No URLs given");
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let actor = BackendActor::new(settings.clone(), cmd_rx, event_tx).await?;
    let backend = tokio::spawn(actor.run());

    if args.update_core {
        cmd_tx.send(BackendCommand::UpdateCore).await?;
        while let Some(event) = event_rx.recv().await {
            if let BackendEvent::UpdateFinished(result) = event {
                match result {
                    Ok(out) => println!("{out}"),
                    Err(e) => eprintln!("Update failed: {e}"),
                }
                break;
            }
        }
        cmd_tx.send(BackendCommand::Shutdown).await?;
        backend.await?;
        return Ok(());
    }

    for url in &args.urls {
        let mut request = TaskRequest::new(url.clone())
            .with_quality(args.quality)
            .with_convert(!args.no_convert)
            .with_bitrate(settings.default_audio_bitrate);
        if let Some(range) = range {
            request = request.with_range(range);
        }
        cmd_tx.send(BackendCommand::Enqueue(request)).await?;
    }
    cmd_tx.send(BackendCommand::Start).await?;
    info!("Queued {} task(s)", args.urls.len());

    let mut interrupts = 0;
    let mut exit_ok = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupts += 1;
                if interrupts == 1 {
                    eprintln!("Stopping after the current operation (Ctrl-C again to clear the queue)");
                    cmd_tx.send(BackendCommand::Stop).await?;
                } else {
                    cmd_tx.send(BackendCommand::HardReset).await?;
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if !report(event, &mut exit_ok) {
                    break;
                }
            }
        }
    }

    cmd_tx.send(BackendCommand::Shutdown).await?;
    backend.await?;

    if !exit_ok {
        bail!("Some downloads did not complete");
    }
    Ok(())
}

/// Print an event; returns false once the run is over
fn report(event: BackendEvent, exit_ok: &mut bool) -> bool {
    match event {
        BackendEvent::TaskAdded { task_id, request } => {
            println!("[{task_id}] queued {}", request.url);
        }
        BackendEvent::Queue(QueueEvent::TitleKnown { task_id, title }) => {
            println!("[{task_id}] {title}");
        }
        BackendEvent::Queue(QueueEvent::StateChanged { task_id, state, .. }) => {
            if state == TaskState::Postprocessing {
                println!("[{task_id}] processing");
            }
        }
        BackendEvent::Queue(QueueEvent::Progress { task_id, progress }) => {
            let speed = progress.speed.unwrap_or(0.0) / 1024.0 / 1024.0;
            eprint!(
                "\r[{task_id}] {:5.1}%  {:6.2} MB/s",
                progress.percentage() * 100.0,
                speed
            );
        }
        BackendEvent::Queue(QueueEvent::TaskCompleted {
            task_id,
            output_path,
            ..
        }) => {
            println!("\n[{task_id}] saved {}", output_path.display());
        }
        BackendEvent::Queue(QueueEvent::TaskFailed {
            task_id,
            error,
            preserved_temp,
            ..
        }) => {
            *exit_ok = false;
            eprintln!("\n[{task_id}] failed: {error}");
            if let Some(path) = preserved_temp {
                eprintln!("[{task_id}] downloaded file kept at {}", path.display());
            }
        }
        BackendEvent::Queue(QueueEvent::QueueFinished(summary)) => {
            println!(
                "Finished: {} done, {} failed, {} aborted, {} pending",
                summary.done, summary.failed, summary.aborted, summary.pending
            );
            if summary.outcome == RunOutcome::Aborted {
                *exit_ok = false;
            }
            return false;
        }
        BackendEvent::Queue(QueueEvent::QueueCleared) => {
            println!("Queue cleared");
            *exit_ok = false;
            return false;
        }
        BackendEvent::Error(e) => {
            warn!("{e}");
            eprintln!("Error: {e}");
        }
        _ => {}
    }
    true
}
