use chrono::{DateTime, Utc};

use super::TranscriptQuality;

/// A row of `processed_videos`. Never updated after insertion.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ProcessedVideo {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_url: String,
    pub quality: TranscriptQuality,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProcessedVideo {
    pub id: String,
    pub title: String,
    pub content: String,
    pub source_url: String,
    pub quality: TranscriptQuality,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Terminal state of one video within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOutcome {
    Skipped,
    NoTranscript,
    GenerationFailed,
    Persisted,
    PersistFailed,
}
