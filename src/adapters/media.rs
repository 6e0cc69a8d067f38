//! Media source backed by yt-dlp and ffmpeg subprocesses.

use crate::ports::media::{ClipWindow, MediaSource};
use crate::ports::PortError;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::Output;
use tempfile::TempPath;
use tokio::process::Command as TokioCommand;

/// Runs the external media binaries. Split out so the subprocess boundary
/// can be mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaCommandRunner: Send + Sync {
    async fn run_download(
        &self,
        video_id: &str,
        clip: Option<ClipWindow>,
        output: &Path,
    ) -> io::Result<Output>;

    async fn run_sample_cut(
        &self,
        input: &Path,
        duration_secs: f64,
        output: &Path,
    ) -> io::Result<Output>;
}

pub struct YtDlpRunner;

#[async_trait]
impl MediaCommandRunner for YtDlpRunner {
    async fn run_download(
        &self,
        video_id: &str,
        clip: Option<ClipWindow>,
        output: &Path,
    ) -> io::Result<Output> {
        let mut command = TokioCommand::new("yt-dlp");
        command
            .arg("-f")
            .arg("bestaudio")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--force-overwrites");
        if let Some(clip) = clip {
            command
                .arg("--download-sections")
                .arg(format!("*{}-{}", clip.start, clip.end()));
        }
        command
            .arg("-o")
            .arg(output)
            .arg(format!("https://www.youtube.com/watch?v={}", video_id));
        command.output().await
    }

    async fn run_sample_cut(
        &self,
        input: &Path,
        duration_secs: f64,
        output: &Path,
    ) -> io::Result<Output> {
        TokioCommand::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(duration_secs.to_string())
            .arg("-acodec")
            .arg("copy")
            .arg(output)
            .output()
            .await
    }
}

/// MediaSource over subprocesses; audio lands in self-deleting temp files.
pub struct SubprocessMediaSource<R> {
    runner: R,
}

impl<R: MediaCommandRunner> SubprocessMediaSource<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

fn fresh_audio_path() -> io::Result<TempPath> {
    Ok(tempfile::Builder::new()
        .prefix("vocero_audio_")
        .suffix(".mp3")
        .tempfile()?
        .into_temp_path())
}

fn check(output: Output, what: &str) -> Result<(), PortError> {
    if output.status.success() {
        return Ok(());
    }
    Err(format!(
        "{} exited with {}: {}",
        what,
        output.status,
        String::from_utf8_lossy(&output.stderr)
    )
    .into())
}

#[async_trait]
impl<R: MediaCommandRunner> MediaSource for SubprocessMediaSource<R> {
    async fn fetch_audio(
        &self,
        video_id: &str,
        clip: Option<ClipWindow>,
    ) -> Result<TempPath, PortError> {
        let path = fresh_audio_path()?;
        let output = self.runner.run_download(video_id, clip, &path).await?;
        check(output, "yt-dlp")?;
        Ok(path)
    }

    async fn extract_sample(
        &self,
        audio: &Path,
        duration_secs: f64,
    ) -> Result<TempPath, PortError> {
        let path = fresh_audio_path()?;
        let output = self
            .runner
            .run_sample_cut(audio, duration_secs, &path)
            .await?;
        check(output, "ffmpeg")?;
        Ok(path)
    }
}
