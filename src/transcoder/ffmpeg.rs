use super::{AudioJob, Transcoder, TrimJob, TrimProfile};
use crate::utils::binaries::find_tool;
use crate::utils::error::{CutterError, DownloadError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const TOOL: &str = "ffmpeg";

/// ffmpeg subprocess transcoder
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(preferred_dir: Option<&Path>) -> Result<Self, CutterError> {
        find_tool(TOOL, preferred_dir)
            .map(Self::with_path)
            .ok_or_else(|| CutterError::ToolNotFound(TOOL.to_string()))
    }

    pub fn with_path(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }

    async fn run(
        &self,
        args: Vec<OsString>,
        output: &Path,
        cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let child = AsyncCommand::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DownloadError::ToolMissing {
                    tool: TOOL.to_string(),
                },
                _ => DownloadError::Io(e),
            })?;

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                // Dropping the wait future kills the child
                warn!("ffmpeg cancelled, removing partial output");
                let _ = tokio::fs::remove_file(output).await;
                return Err(DownloadError::Aborted);
            }
            result = child.wait_with_output() => result?,
        };

        if !result.status.success() {
            let _ = tokio::fs::remove_file(output).await;
            return Err(DownloadError::ToolFailed {
                tool: TOOL.to_string(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn trim(&self, job: &TrimJob, cancel: CancellationToken) -> Result<PathBuf, DownloadError> {
        info!(
            "Trimming {} [{}s..{}s] -> {}",
            job.input.display(),
            job.start,
            job.end,
            job.output.display()
        );
        self.run(trim_args(job), &job.output, cancel).await
    }

    async fn extract_audio(
        &self,
        job: &AudioJob,
        cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        debug!("Extracting audio {} -> {}", job.input.display(), job.output.display());
        self.run(audio_args(job), &job.output, cancel).await
    }
}

fn base_args() -> Vec<OsString> {
    ["-nostdin", "-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// Arguments for a re-encoding cut with input seeking
pub fn trim_args(job: &TrimJob) -> Vec<OsString> {
    let mut args = base_args();
    args.extend([
        "-ss".into(),
        job.start.to_string().into(),
        "-i".into(),
        job.input.clone().into_os_string(),
        "-t".into(),
        job.duration().to_string().into(),
    ]);

    match job.profile {
        TrimProfile::Mp4 => args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            "veryfast".into(),
            "-c:a".into(),
            "aac".into(),
            "-movflags".into(),
            "+faststart".into(),
        ]),
        TrimProfile::Native => {}
        TrimProfile::Mp3 => args.extend(["-vn".into(), "-c:a".into(), "libmp3lame".into()]),
    }

    args.extend(["-b:a".into(), job.bitrate.encoder_arg().into()]);
    args.push(job.output.clone().into_os_string());
    args
}

pub fn audio_args(job: &AudioJob) -> Vec<OsString> {
    let mut args = base_args();
    args.extend([
        "-i".into(),
        job.input.clone().into_os_string(),
        "-vn".into(),
        "-c:a".into(),
        "libmp3lame".into(),
        "-b:a".into(),
        job.bitrate.encoder_arg().into(),
        job.output.clone().into_os_string(),
    ]);
    args
}
