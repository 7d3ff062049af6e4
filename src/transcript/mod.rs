//! Transcript acquisition.
//!
//! Each way of getting text for a video is an [`AcquisitionStrategy`]. The
//! [`TranscriptAcquirer`] holds them in priority order (cheapest and most
//! reliable first) and stops at the first one that produces text. A strategy
//! that errors or comes back empty never stops the chain.

mod audio;
mod captions;
mod description;
mod provider;
mod speech;

use async_trait::async_trait;

use crate::app::TranscriptSource;
use crate::config::Config;
use crate::error::Result;
use crate::models::{Transcript, TranscriptQuality, Video};

pub use audio::{AudioFetcher, AudioRoute};
pub use captions::NativeCaptions;
pub use description::DescriptionFallback;
pub use provider::TranscriptService;
pub use speech::SpeechToText;

#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn quality(&self) -> TranscriptQuality {
        TranscriptQuality::Transcript
    }

    /// `Ok(None)` means this strategy has nothing for the video.
    async fn attempt(&self, video: &Video) -> Result<Option<String>>;
}

pub struct TranscriptAcquirer {
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl TranscriptAcquirer {
    pub fn new(strategies: Vec<Box<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    /// The default chain: captions, transcript service, speech-to-text,
    /// description.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut strategies: Vec<Box<dyn AcquisitionStrategy>> =
            vec![Box::new(NativeCaptions::new(config)?)];

        if !config.transcript_api_keys.is_empty() {
            strategies.push(Box::new(TranscriptService::new(config)?));
        }

        if config.speech_to_text && !config.transcriber_command.is_empty() {
            strategies.push(Box::new(SpeechToText::new(config)?));
        }

        strategies.push(Box::new(DescriptionFallback::new(
            config.min_description_chars,
        )));

        Ok(Self::new(strategies))
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn acquire(&self, video: &Video) -> Option<Transcript> {
        for strategy in &self.strategies {
            let name = strategy.name();
            match strategy.attempt(video).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    tracing::info!(
                        video_id = %video.id,
                        strategy = name,
                        chars = text.chars().count(),
                        "Transcript acquired"
                    );
                    return Some(Transcript {
                        text: text.trim().to_string(),
                        quality: strategy.quality(),
                        source: name,
                    });
                }
                Ok(_) => {
                    tracing::debug!(video_id = %video.id, strategy = name, "No text");
                }
                Err(e) => {
                    tracing::warn!(video_id = %video.id, strategy = name, "Strategy failed: {}", e);
                }
            }
        }

        tracing::info!(video_id = %video.id, "All transcript strategies exhausted");
        None
    }
}

#[async_trait]
impl TranscriptSource for TranscriptAcquirer {
    async fn acquire(&self, video: &Video) -> Option<Transcript> {
        TranscriptAcquirer::acquire(self, video).await
    }
}
