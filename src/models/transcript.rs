use std::fmt;

/// How trustworthy the acquired text is as a stand-in for the spoken content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptQuality {
    /// Captions, a transcript service or speech-to-text.
    Transcript,
    /// Only the video description was available.
    Description,
}

impl TranscriptQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptQuality::Transcript => "transcript",
            TranscriptQuality::Description => "description",
        }
    }
}

impl fmt::Display for TranscriptQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub quality: TranscriptQuality,
    /// Name of the strategy that produced the text.
    pub source: &'static str,
}
