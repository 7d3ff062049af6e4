use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use crate::config::Config;
use crate::error::Result;
use crate::models::Video;
use crate::services::build_client;
use crate::services::cookies::{cookie_header, with_cookies};

use super::AcquisitionStrategy;

static TEXT_CUE: OnceLock<Regex> = OnceLock::new();
static PARAGRAPH_CUE: OnceLock<Regex> = OnceLock::new();
static TAG: OnceLock<Regex> = OnceLock::new();

/// Platform captions from the public timedtext endpoint. Languages are tried
/// in preference order; within a language the manual track comes before the
/// auto-generated one.
pub struct NativeCaptions {
    client: Client,
    url: String,
    languages: Vec<String>,
    cookies: String,
}

impl NativeCaptions {
    pub fn new(config: &Config) -> Result<Self> {
        let cookies = match &config.cookies_file {
            Some(path) => cookie_header(path, "youtube.com").unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable cookie file {:?}: {}", path, e);
                String::new()
            }),
            None => String::new(),
        };

        Ok(Self {
            client: build_client(config.http_timeout_secs)?,
            url: config.timedtext_url.clone(),
            languages: config.caption_languages.clone(),
            cookies,
        })
    }

    async fn fetch_track(&self, video_id: &str, lang: &str, auto: bool) -> Result<Option<String>> {
        let mut query = vec![("v", video_id), ("lang", lang)];
        if auto {
            query.push(("kind", "asr"));
        }

        let request = with_cookies(self.client.get(&self.url).query(&query), &self.cookies);
        let response = request.send().await?;

        if !response.status().is_success() {
            tracing::debug!(video_id, lang, auto, "Caption request returned {}", response.status());
            return Ok(None);
        }

        let xml = response.text().await?;
        let text = captions_to_text(&xml);
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

#[async_trait]
impl AcquisitionStrategy for NativeCaptions {
    fn name(&self) -> &'static str {
        "captions"
    }

    async fn attempt(&self, video: &Video) -> Result<Option<String>> {
        for lang in &self.languages {
            for auto in [false, true] {
                match self.fetch_track(&video.id, lang, auto).await {
                    Ok(Some(text)) => {
                        tracing::debug!(video_id = %video.id, lang = %lang, auto, "Captions found");
                        return Ok(Some(text));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(video_id = %video.id, lang = %lang, "Caption fetch failed: {}", e);
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Reduce timedtext XML (legacy `<text>` cues or srv3 `<p>` cues) to plain text.
pub fn captions_to_text(xml: &str) -> String {
    let text_cue = TEXT_CUE.get_or_init(|| Regex::new(r"(?s)<text[^>]*>(.*?)</text>").expect("valid cue regex"));
    let paragraph_cue =
        PARAGRAPH_CUE.get_or_init(|| Regex::new(r"(?s)<p[^>]*>(.*?)</p>").expect("valid cue regex"));
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

    let mut cues: Vec<&str> = text_cue
        .captures_iter(xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if cues.is_empty() {
        cues = paragraph_cue
            .captures_iter(xml)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
    }

    cues.into_iter()
        .map(|cue| {
            // Cue bodies are entity-encoded twice (`&amp;#39;`)
            let once = html_escape::decode_html_entities(cue);
            let twice = html_escape::decode_html_entities(&once);
            tag.replace_all(&twice, " ").into_owned()
        })
        .flat_map(|cue| {
            cue.split_whitespace()
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
