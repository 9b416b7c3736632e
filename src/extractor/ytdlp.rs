//! yt-dlp wrapper for metadata resolution and downloads
//!
//! Every invocation is a fully specified argument list; the final file path is
//! printed by yt-dlp after post-processing instead of being guessed.

use crate::downloader::progress::{parse_legacy_line, parse_template_line, progress_template};
use crate::downloader::DownloadProgress;
use crate::extractor::models::{
    DownloadRequest, DownloadedMedia, ExtractorOptions, Postprocess, VideoInfo,
};
use crate::extractor::traits::Extractor;
use crate::utils::binaries::find_tool;
use crate::utils::error::{CutterError, DownloadError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const TOOL: &str = "yt-dlp";
const TITLE_MARKER: &str = "__RC_TITLE__";
const FILE_MARKER: &str = "__RC_FILE__";

/// Extractor backed by the yt-dlp executable
pub struct YtDlpExtractor {
    ytdlp_path: PathBuf,
    metadata_timeout: Duration,
}

impl YtDlpExtractor {
    /// Locate yt-dlp (bundled, PATH, common locations)
    pub fn new(preferred_dir: Option<&Path>) -> Result<Self, CutterError> {
        let ytdlp_path = find_tool(TOOL, preferred_dir).ok_or_else(|| {
            error!("yt-dlp not found anywhere!");
            CutterError::ToolNotFound(TOOL.to_string())
        })?;
        Ok(Self::with_path(ytdlp_path))
    }

    pub fn with_path(ytdlp_path: PathBuf) -> Self {
        Self {
            ytdlp_path,
            metadata_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Get the path to yt-dlp being used
    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }

    /// Update yt-dlp in place (`yt-dlp -U`)
    pub async fn self_update(&self) -> Result<String, DownloadError> {
        info!("Updating yt-dlp at {}", self.ytdlp_path.display());
        let output = AsyncCommand::new(&self.ytdlp_path)
            .arg("-U")
            .output()
            .await
            .map_err(spawn_error)?;

        if !output.status.success() {
            return Err(DownloadError::ToolFailed {
                tool: TOOL.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn id(&self) -> &'static str {
        TOOL
    }

    async fn resolve_metadata(
        &self,
        url: &str,
        options: &ExtractorOptions,
    ) -> Result<VideoInfo, DownloadError> {
        debug!("Resolving metadata for URL: {}", url);

        let mut cmd = AsyncCommand::new(&self.ytdlp_path);
        cmd.args(metadata_args(url, options)).kill_on_drop(true);

        let output = tokio::time::timeout(self.metadata_timeout, cmd.output())
            .await
            .map_err(|_| DownloadError::Timeout(self.metadata_timeout))?
            .map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("yt-dlp metadata extraction failed: {}", stderr);
            return Err(DownloadError::classify(&error_summary(&stderr)));
        }

        serde_json::from_slice::<VideoInfo>(&output.stdout)
            .map_err(|e| DownloadError::Other(format!("Unreadable metadata: {e}")))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> Result<DownloadedMedia, DownloadError> {
        debug!("yt-dlp download with selector {}", request.selector);

        let mut child = AsyncCommand::new(&self.ytdlp_path)
            .args(download_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Other("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Other("yt-dlp stderr unavailable".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("yt-dlp: {}", line);
                collected.push(line);
            }
            collected.join("\n")
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut title = None;
        let mut final_path = None;

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Cancellation requested, stopping yt-dlp");
                    let _ = child.kill().await;
                    return Err(DownloadError::Aborted);
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };

            if let Some(progress) = parse_template_line(&line).or_else(|| parse_legacy_line(&line)) {
                if cancel.is_cancelled() {
                    let _ = child.kill().await;
                    return Err(DownloadError::Aborted);
                }
                let _ = progress_tx.send(progress).await;
            } else if let Some(value) = line.strip_prefix(TITLE_MARKER) {
                title = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(FILE_MARKER) {
                final_path = Some(PathBuf::from(value.trim()));
            } else {
                debug!("yt-dlp: {}", line);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if cancel.is_cancelled() {
            return Err(DownloadError::Aborted);
        }
        if !status.success() {
            warn!("yt-dlp exited with {:?}", status.code());
            return Err(DownloadError::classify(&error_summary(&stderr)));
        }

        let path = final_path.ok_or_else(|| {
            DownloadError::Other("yt-dlp finished without reporting the output file".to_string())
        })?;
        Ok(DownloadedMedia::new(path, title.unwrap_or_default()))
    }
}

fn spawn_error(e: std::io::Error) -> DownloadError {
    match e.kind() {
        std::io::ErrorKind::NotFound => DownloadError::ToolMissing {
            tool: TOOL.to_string(),
        },
        _ => DownloadError::Io(e),
    }
}

/// `ERROR:` lines of the tool output, or its tail when there are none
fn error_summary(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .filter(|line| line.contains("ERROR"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(5);
    let tail = lines[start..].join("\n");
    if tail.trim().is_empty() {
        "yt-dlp failed without output".to_string()
    } else {
        tail
    }
}

fn option_args(options: &ExtractorOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if options.proxy_disabled {
        args.extend(["--proxy".into(), "".into()]);
    }
    if let Some(runtime) = &options.js_runtime {
        args.extend(["--js-runtimes".into(), runtime.into()]);
    }
    if let Some(browser) = options.cookie_source.browser() {
        args.extend(["--cookies-from-browser".into(), browser.into()]);
    }
    if let Some(location) = &options.ffmpeg_location {
        args.extend(["--ffmpeg-location".into(), location.into()]);
    }
    args
}

/// Arguments for `--dump-json` metadata resolution
pub fn metadata_args(url: &str, options: &ExtractorOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["--dump-json", "--no-download", "--no-warnings", "--no-playlist"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.extend(option_args(options));
    args.extend(["--".into(), url.into()]);
    args
}

/// Arguments for a download attempt
pub fn download_args(request: &DownloadRequest) -> Vec<OsString> {
    let mut template = request.output_stem.clone().into_os_string();
    template.push(".%(ext)s");

    let mut args: Vec<OsString> = [
        "--newline",
        "--progress",
        "--no-warnings",
        "--no-playlist",
        "--no-simulate",
        "--retries",
        "10",
        "--fragment-retries",
        "10",
        "--socket-timeout",
        "30",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    args.extend([
        "--progress-template".into(),
        progress_template().into(),
        "--print".into(),
        format!("before_dl:{TITLE_MARKER}%(title)s").into(),
        "--print".into(),
        format!("after_move:{FILE_MARKER}%(filepath)s").into(),
        "-f".into(),
        request.selector.to_selector_string().into(),
        "-o".into(),
        template,
    ]);

    match request.postprocess {
        Postprocess::None => {}
        Postprocess::MergeMp4 => args.extend([
            "--merge-output-format".into(),
            "mp4".into(),
            "--remux-video".into(),
            "mp4".into(),
            "--postprocessor-args".into(),
            "ffmpeg:-c:v copy -c:a aac".into(),
        ]),
        Postprocess::ExtractAudio { bitrate } => args.extend([
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            format!("{}K", bitrate.kbps()).into(),
        ]),
    }

    args.extend(option_args(&request.options));
    args.extend(["--".into(), request.url.clone().into()]);
    args
}
