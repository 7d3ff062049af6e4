use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Video;

use super::audio::{find_file, run_command};
use super::{AcquisitionStrategy, AudioFetcher};

/// Local speech-to-text over a downloaded audio track.
///
/// Everything is written to a fresh directory under `work_root` which is
/// removed when the attempt ends, whatever the outcome.
pub struct SpeechToText {
    fetcher: AudioFetcher,
    command: Vec<String>,
    work_root: PathBuf,
    timeout: Duration,
}

impl SpeechToText {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            fetcher: AudioFetcher::new(config)?,
            command: config.transcriber_command.clone(),
            work_root: config.work_dir(),
            timeout: Duration::from_secs(config.command_timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn with_fetcher(mut self, fetcher: AudioFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    async fn transcribe_in(&self, video: &Video, dir: &Path) -> Result<Option<String>> {
        let audio = self.fetcher.download(video, dir).await?;

        let output_dir = dir.join("out");
        tokio::fs::create_dir_all(&output_dir).await?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| AppError::Config("transcriber_command is empty".to_string()))?;
        let args: Vec<String> = args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &audio.to_string_lossy())
                    .replace("{output_dir}", &output_dir.to_string_lossy())
            })
            .collect();

        tracing::info!(video_id = %video.id, "Running speech-to-text");
        run_command(program, &args, self.timeout).await?;

        let Some(text_file) = find_file(&output_dir, |name| name.ends_with(".txt")).await? else {
            return Ok(None);
        };
        let raw = tokio::fs::read_to_string(&text_file).await?;
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");

        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

#[async_trait]
impl AcquisitionStrategy for SpeechToText {
    fn name(&self) -> &'static str {
        "speech-to-text"
    }

    async fn attempt(&self, video: &Video) -> Result<Option<String>> {
        tracing::debug!(video_id = %video.id, routes = self.fetcher.routes().len(), "Fetching audio");
        tokio::fs::create_dir_all(&self.work_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix("tube-news-")
            .tempdir_in(&self.work_root)?;

        let result = self.transcribe_in(video, workdir.path()).await;

        if let Err(e) = workdir.close() {
            tracing::warn!(video_id = %video.id, "Failed to remove work directory: {}", e);
        }
        result
    }
}
