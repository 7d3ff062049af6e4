use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Video;
use crate::services::{build_client, classify_status, Attempt, CredentialQueue, FailureClass};

use super::AcquisitionStrategy;

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    content: Value,
}

/// Hosted transcript API (Supadata-compatible), rotating through API keys
/// when one is rejected or out of quota.
pub struct TranscriptService {
    client: Client,
    base_url: String,
    credentials: CredentialQueue,
}

impl TranscriptService {
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = CredentialQueue::new("transcript-service", config.transcript_api_keys.clone())
            .with_delay(Duration::from_millis(config.retry_delay_ms));

        Ok(Self {
            client: build_client(config.http_timeout_secs)?,
            base_url: config.transcript_api_base.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn request(&self, video_id: &str, api_key: String) -> Attempt<Option<String>> {
        let response = match self
            .client
            .get(format!("{}/youtube/transcript", self.base_url))
            .header("x-api-key", api_key)
            .query(&[("videoId", video_id), ("text", "true")])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Attempt::Fail(e.into()),
        };

        let status = response.status();
        if status == reqwest::StatusCode::OK {
            return match response.json::<TranscriptResponse>().await {
                Ok(body) => Attempt::Done(content_to_text(&body.content)),
                Err(e) => Attempt::Fail(e.into()),
            };
        }

        let error_text = response.text().await.unwrap_or_default();
        match classify_status(status) {
            FailureClass::Rotate => Attempt::Rotate(format!("HTTP {}", status)),
            FailureClass::Abort => Attempt::Fail(AppError::TranscriptApi(format!(
                "HTTP {}: {}",
                status, error_text
            ))),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for TranscriptService {
    fn name(&self) -> &'static str {
        "transcript-service"
    }

    async fn attempt(&self, video: &Video) -> Result<Option<String>> {
        if self.credentials.is_empty() {
            return Ok(None);
        }
        let video_id = video.id.as_str();
        self.credentials
            .run(move |key| self.request(video_id, key))
            .await
    }
}

/// `content` is a string with `text=true`, or a list of timed segments.
fn content_to_text(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(s) => s.trim().to_string(),
        Value::Array(segments) => segments
            .iter()
            .filter_map(|s| s.get("text").and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn service_for(server: &mockito::Server, keys: &[&str]) -> TranscriptService {
        let config = Config {
            transcript_api_base: server.url(),
            transcript_api_keys: keys.iter().map(|k| k.to_string()).collect(),
            retry_delay_ms: 0,
            ..Config::default()
        };
        TranscriptService::new(&config).unwrap()
    }

    #[test]
    fn segment_lists_are_joined() {
        let content = serde_json::json!([{"text": "one ", "offset": 0}, {"text": "two"}, {"offset": 5}]);
        assert_eq!(content_to_text(&content).as_deref(), Some("one two"));
        assert_eq!(content_to_text(&serde_json::json!("  ")), None);
        assert_eq!(content_to_text(&Value::Null), None);
    }

    #[tokio::test]
    async fn rotates_past_exhausted_key() {
        let mut server = mockito::Server::new_async().await;
        let exhausted = server
            .mock("GET", "/youtube/transcript")
            .match_header("x-api-key", "k1")
            .match_query(Matcher::UrlEncoded("videoId".into(), "abc123".into()))
            .with_status(429)
            .create_async()
            .await;
        let working = server
            .mock("GET", "/youtube/transcript")
            .match_header("x-api-key", "k2")
            .match_query(Matcher::UrlEncoded("videoId".into(), "abc123".into()))
            .with_status(200)
            .with_body(r#"{"content": "the spoken words", "lang": "en"}"#)
            .create_async()
            .await;

        let text = service_for(&server, &["k1", "k2"])
            .attempt(&Video::new("abc123", "t"))
            .await
            .unwrap();

        exhausted.assert_async().await;
        working.assert_async().await;
        assert_eq!(text.as_deref(), Some("the spoken words"));
    }

    #[tokio::test]
    async fn provider_failure_does_not_rotate() {
        let mut server = mockito::Server::new_async().await;
        let broken = server
            .mock("GET", "/youtube/transcript")
            .match_header("x-api-key", "k1")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let unused = server
            .mock("GET", "/youtube/transcript")
            .match_header("x-api-key", "k2")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"content": "x"}"#)
            .expect(0)
            .create_async()
            .await;

        let result = service_for(&server, &["k1", "k2"])
            .attempt(&Video::new("abc123", "t"))
            .await;

        broken.assert_async().await;
        unused.assert_async().await;
        assert!(matches!(result, Err(AppError::TranscriptApi(_))));
    }

    #[tokio::test]
    async fn all_keys_rejected_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _rejected = server
            .mock("GET", "/youtube/transcript")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let result = service_for(&server, &["k1", "k2"])
            .attempt(&Video::new("abc123", "t"))
            .await;
        assert!(matches!(result, Err(AppError::CredentialsExhausted(_))));
    }
}
