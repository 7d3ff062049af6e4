use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::app::VideoLister;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Video;
use crate::services::build_client;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Snippet,
}

/// Lists the latest uploads of a channel through the YouTube Data API v3.
pub struct YouTubeLister {
    client: Client,
    api_key: String,
    base_url: String,
    max_results: u32,
}

impl YouTubeLister {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client(config.http_timeout_secs)?,
            api_key: config.youtube_api_key.clone(),
            base_url: config.youtube_api_base.trim_end_matches('/').to_string(),
            max_results: config.max_videos,
        })
    }

    pub async fn fetch_recent(&self, channel_id: &str) -> Result<Vec<Video>> {
        let max_results = self.max_results.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("channelId", channel_id),
                ("part", "snippet"),
                ("order", "date"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::YouTubeApi(format!(
                "search.list returned {}: {}",
                status, error_text
            )));
        }

        let search: SearchResponse = response.json().await?;
        let mut videos: Vec<Video> = search
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                Some(
                    Video::new(id, decode(&item.snippet.title))
                        .with_description(decode(&item.snippet.description)),
                )
            })
            .take(self.max_results as usize)
            .collect();

        // Search snippets cut descriptions short
        match self.fetch_descriptions(&videos).await {
            Ok(full) => {
                for video in &mut videos {
                    if let Some(description) = full.get(&video.id) {
                        video.description = description.clone();
                    }
                }
            }
            Err(e) => {
                tracing::debug!("Keeping search descriptions: {}", e);
            }
        }

        Ok(videos)
    }

    async fn fetch_descriptions(&self, videos: &[Video]) -> Result<HashMap<String, String>> {
        if videos.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = videos
            .iter()
            .map(|v| v.id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("id", ids.as_str()),
                ("part", "snippet"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::YouTubeApi(format!(
                "videos.list returned {}",
                response.status()
            )));
        }

        let list: VideoListResponse = response.json().await?;
        Ok(list
            .items
            .into_iter()
            .map(|item| (item.id, decode(&item.snippet.description)))
            .collect())
    }
}

#[async_trait]
impl VideoLister for YouTubeLister {
    async fn list_recent(&self, channel_id: &str) -> Vec<Video> {
        match self.fetch_recent(channel_id).await {
            Ok(videos) => videos,
            Err(e) => {
                tracing::warn!(channel_id, "Failed to list channel videos: {}", e);
                Vec::new()
            }
        }
    }
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
