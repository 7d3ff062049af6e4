mod article;
mod transcript;
mod video;

#[cfg(test)]
pub use article::ProcessedVideo;
pub use article::{InsertOutcome, NewProcessedVideo, VideoOutcome};
pub use transcript::{Transcript, TranscriptQuality};
pub use video::Video;
