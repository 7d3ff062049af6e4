use async_trait::async_trait;

use crate::error::Result;
use crate::models::{TranscriptQuality, Video};

use super::AcquisitionStrategy;

/// Last resort: the uploader's description, when it says enough to write from.
pub struct DescriptionFallback {
    min_chars: usize,
}

impl DescriptionFallback {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

#[async_trait]
impl AcquisitionStrategy for DescriptionFallback {
    fn name(&self) -> &'static str {
        "description"
    }

    fn quality(&self) -> TranscriptQuality {
        TranscriptQuality::Description
    }

    async fn attempt(&self, video: &Video) -> Result<Option<String>> {
        let description = video.description.trim();
        if description.chars().count() > self.min_chars {
            Ok(Some(description.to_string()))
        } else {
            Ok(None)
        }
    }
}
