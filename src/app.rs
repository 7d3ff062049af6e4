use async_trait::async_trait;
use chrono::Utc;

use crate::ai::truncate_chars;
use crate::config::Config;
use crate::error::Result;
use crate::models::{InsertOutcome, NewProcessedVideo, Transcript, TranscriptQuality, Video, VideoOutcome};
use crate::youtube::{clean_title, source_url};

/// Lists recent videos of a channel. Never fails: upstream problems mean
/// "nothing to do".
#[async_trait]
pub trait VideoLister: Send + Sync {
    async fn list_recent(&self, channel_id: &str) -> Vec<Video>;
}

/// Durable record of processed videos.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn exists(&self, video_id: &str) -> Result<bool>;
    async fn insert(&self, video: NewProcessedVideo) -> Result<InsertOutcome>;
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn acquire(&self, video: &Video) -> Option<Transcript>;
}

#[async_trait]
pub trait ArticleWriter: Send + Sync {
    async fn write(&self, title: &str, text: &str, quality: TranscriptQuality) -> Result<String>;
}

/// Counts of terminal outcomes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub skipped: usize,
    pub no_transcript: usize,
    pub generation_failed: usize,
    pub persisted: usize,
    pub persist_failed: usize,
}

impl RunReport {
    fn record(&mut self, outcome: VideoOutcome) {
        match outcome {
            VideoOutcome::Skipped => self.skipped += 1,
            VideoOutcome::NoTranscript => self.no_transcript += 1,
            VideoOutcome::GenerationFailed => self.generation_failed += 1,
            VideoOutcome::Persisted => self.persisted += 1,
            VideoOutcome::PersistFailed => self.persist_failed += 1,
        }
    }
}

/// One pass over a channel: list, filter, acquire, generate, persist.
pub struct Pipeline<'a> {
    channel_id: String,
    text_budget: usize,
    lister: &'a dyn VideoLister,
    store: &'a dyn ArticleStore,
    transcripts: &'a dyn TranscriptSource,
    writer: &'a dyn ArticleWriter,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &Config,
        lister: &'a dyn VideoLister,
        store: &'a dyn ArticleStore,
        transcripts: &'a dyn TranscriptSource,
        writer: &'a dyn ArticleWriter,
    ) -> Self {
        Self {
            channel_id: config.channel_id.clone(),
            text_budget: config.text_budget,
            lister,
            store,
            transcripts,
            writer,
        }
    }

    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();

        let videos = self.lister.list_recent(&self.channel_id).await;
        if videos.is_empty() {
            tracing::info!(channel_id = %self.channel_id, "No videos found");
            return report;
        }

        report.discovered = videos.len();
        for video in &videos {
            let outcome = self.process(video).await;
            report.record(outcome);
        }

        tracing::info!(
            discovered = report.discovered,
            skipped = report.skipped,
            persisted = report.persisted,
            no_transcript = report.no_transcript,
            generation_failed = report.generation_failed,
            persist_failed = report.persist_failed,
            "Run complete"
        );
        report
    }

    pub async fn process(&self, video: &Video) -> VideoOutcome {
        let title = clean_title(&video.title);

        // Check before spending anything on the video
        match self.store.exists(&video.id).await {
            Ok(true) => {
                tracing::info!(video_id = %video.id, "[exists] {}", title);
                return VideoOutcome::Skipped;
            }
            Ok(false) => {
                tracing::info!(video_id = %video.id, "[new] {}", title);
            }
            Err(e) => {
                tracing::error!(video_id = %video.id, "Duplicate check failed, skipping: {}", e);
                return VideoOutcome::Skipped;
            }
        }

        let Some(transcript) = self.transcripts.acquire(video).await else {
            tracing::info!(video_id = %video.id, "Skipping: no usable text");
            return VideoOutcome::NoTranscript;
        };

        let text = truncate_chars(&transcript.text, self.text_budget);
        let content = match self.writer.write(&title, text, transcript.quality).await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(video_id = %video.id, "Article generation failed: {}", e);
                return VideoOutcome::GenerationFailed;
            }
        };

        let record = NewProcessedVideo {
            id: video.id.clone(),
            title,
            content,
            source_url: source_url(&video.id),
            quality: transcript.quality,
            processed_at: Utc::now(),
        };

        match self.store.insert(record).await {
            Ok(InsertOutcome::Inserted) => {
                tracing::info!(
                    video_id = %video.id,
                    quality = %transcript.quality,
                    source = transcript.source,
                    "Saved article"
                );
                VideoOutcome::Persisted
            }
            Ok(InsertOutcome::AlreadyExists) => {
                tracing::info!(video_id = %video.id, "Already saved by another run");
                VideoOutcome::Skipped
            }
            Err(e) => {
                tracing::error!(video_id = %video.id, "Failed to save article: {}", e);
                VideoOutcome::PersistFailed
            }
        }
    }
}
