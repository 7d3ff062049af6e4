use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app::ArticleWriter;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::TranscriptQuality;
use crate::services::{build_client, classify_status, Attempt, CredentialQueue, FailureClass};

use super::prompt::{build_prompt, clean_article, word_count};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

/// Writes articles with the Gemini `generateContent` API.
pub struct Generator {
    client: Client,
    base_url: String,
    models: Vec<String>,
    credentials: CredentialQueue,
    min_words: usize,
    retry_delay: Duration,
}

impl Generator {
    pub fn new(config: &Config) -> Result<Self> {
        let retry_delay = Duration::from_millis(config.retry_delay_ms);
        Ok(Self {
            client: build_client(config.generation_timeout_secs)?,
            base_url: config.gemini_api_base.trim_end_matches('/').to_string(),
            models: config.generation_models.clone(),
            credentials: CredentialQueue::new("gemini", config.gemini_api_keys.clone())
                .with_delay(retry_delay),
            min_words: config.min_words,
            retry_delay,
        })
    }

    /// Generate an article body. The caller is responsible for truncating `text`.
    pub async fn generate_article(
        &self,
        title: &str,
        text: &str,
        quality: TranscriptQuality,
    ) -> Result<String> {
        let prompt = build_prompt(title, text, quality, self.min_words);
        let prompt = prompt.as_str();

        let (article, model) = self
            .credentials
            .run(move |key| self.generate_with_key(key, prompt))
            .await?;

        let words = word_count(&article);
        if quality == TranscriptQuality::Transcript && words < self.min_words {
            tracing::warn!(model = %model, words, min_words = self.min_words, "Article shorter than target");
        }
        tracing::debug!(model = %model, words, "Article generated");

        Ok(article)
    }

    /// Try every model with one key. Quotas are per model, so a quota or auth
    /// error only moves on to the next key once every model has been tried.
    async fn generate_with_key(&self, api_key: String, prompt: &str) -> Attempt<(String, String)> {
        let mut last_error = String::from("no models configured");
        let mut rejected = false;

        for (index, model) in self.models.iter().enumerate() {
            if index > 0 && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.call_model(&api_key, model, prompt).await {
                Ok(Some(article)) => return Attempt::Done((article, model.clone())),
                Ok(None) => {
                    last_error = format!("{} returned no text", model);
                }
                Err(ModelError::Status(status, body)) => {
                    rejected |= classify_status(status) == FailureClass::Rotate;
                    last_error = format!("{} answered HTTP {}: {}", model, status, body);
                }
                Err(ModelError::Other(e)) => {
                    last_error = format!("{}: {}", model, e);
                }
            }
            tracing::warn!("Generation attempt failed: {}", last_error);
        }

        if rejected {
            Attempt::Rotate(last_error)
        } else {
            Attempt::Fail(AppError::GenerationApi(last_error))
        }
    }

    async fn call_model(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
    ) -> std::result::Result<Option<String>, ModelError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 8192,
            },
        };

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Other(e.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Status(status, error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Other(e.into()))?;

        let raw = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let article = clean_article(&raw);
        Ok(if article.is_empty() { None } else { Some(article) })
    }

    /// Models usable for `generateContent` with the first configured key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.credentials
            .run(move |key| async move {
                let response = match self
                    .client
                    .get(format!("{}/models", self.base_url))
                    .query(&[("key", key.as_str())])
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => return Attempt::Fail(e.into()),
                };

                let status = response.status();
                if !status.is_success() {
                    return match classify_status(status) {
                        FailureClass::Rotate => Attempt::Rotate(format!("HTTP {}", status)),
                        FailureClass::Abort => {
                            Attempt::Fail(AppError::GenerationApi(format!("HTTP {}", status)))
                        }
                    };
                }

                match response.json::<ModelsResponse>().await {
                    Ok(list) => Attempt::Done(
                        list.models
                            .into_iter()
                            .filter(|m| {
                                m.supported_generation_methods
                                    .iter()
                                    .any(|g| g == "generateContent")
                            })
                            .collect(),
                    ),
                    Err(e) => Attempt::Fail(e.into()),
                }
            })
            .await
    }
}

enum ModelError {
    Status(reqwest::StatusCode, String),
    Other(AppError),
}

#[async_trait]
impl ArticleWriter for Generator {
    async fn write(&self, title: &str, text: &str, quality: TranscriptQuality) -> Result<String> {
        self.generate_article(title, text, quality).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const OK_BODY: &str = r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "```html\n<h2>Foo</h2>"}, {"text": "<p>Bar</p>\n```"}]}}]}"#;

    fn generator_for(server: &mockito::Server, keys: &[&str], models: &[&str]) -> Generator {
        let config = Config {
            gemini_api_base: server.url(),
            gemini_api_keys: keys.iter().map(|k| k.to_string()).collect(),
            generation_models: models.iter().map(|m| m.to_string()).collect(),
            retry_delay_ms: 0,
            min_words: 1,
            ..Config::default()
        };
        Generator::new(&config).unwrap()
    }

    #[tokio::test]
    async fn sends_prompt_and_cleans_reply() {
        let mut server = mockito::Server::new_async().await;
        let call = server
            .mock("POST", "/models/flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k1".into()))
            .match_body(Matcher::Regex("hello world this is the content".to_string()))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let article = generator_for(&server, &["k1"], &["flash"])
            .write("Foo", "hello world this is the content", TranscriptQuality::Transcript)
            .await
            .unwrap();

        call.assert_async().await;
        assert_eq!(article, "<h2>Foo</h2><p>Bar</p>");
    }

    #[tokio::test]
    async fn falls_back_to_alternate_model() {
        let mut server = mockito::Server::new_async().await;
        let missing = server
            .mock("POST", "/models/flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error": {"message": "model not found"}}"#)
            .create_async()
            .await;
        let pro = server
            .mock("POST", "/models/pro:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k1".into()))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let article = generator_for(&server, &["k1"], &["flash", "pro"])
            .write("Foo", "text", TranscriptQuality::Transcript)
            .await
            .unwrap();

        missing.assert_async().await;
        pro.assert_async().await;
        assert!(article.starts_with("<h2>Foo</h2>"));
    }

    #[tokio::test]
    async fn rotates_key_on_quota() {
        let mut server = mockito::Server::new_async().await;
        let quota = server
            .mock("POST", "/models/flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k1".into()))
            .with_status(429)
            .create_async()
            .await;
        let quota_pro = server
            .mock("POST", "/models/pro:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k1".into()))
            .with_status(429)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/models/flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k2".into()))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let result = generator_for(&server, &["k1", "k2"], &["flash", "pro"])
            .write("Foo", "text", TranscriptQuality::Transcript)
            .await;

        quota.assert_async().await;
        quota_pro.assert_async().await;
        second.assert_async().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn quota_on_one_model_tries_the_next_under_same_key() {
        let mut server = mockito::Server::new_async().await;
        let flash = server
            .mock("POST", "/models/flash:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k1".into()))
            .with_status(429)
            .create_async()
            .await;
        let pro = server
            .mock("POST", "/models/pro:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "k1".into()))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let article = generator_for(&server, &["k1"], &["flash", "pro"])
            .write("Foo", "text", TranscriptQuality::Transcript)
            .await
            .unwrap();

        flash.assert_async().await;
        pro.assert_async().await;
        assert_eq!(article, "<h2>Foo</h2><p>Bar</p>");
    }

    #[tokio::test]
    async fn every_model_rejected_exhausts_the_key() {
        let mut server = mockito::Server::new_async().await;
        let _rejected = server
            .mock("POST", Matcher::Regex(r"^/models/(flash|pro):generateContent$".to_string()))
            .match_query(Matcher::Any)
            .with_status(403)
            .expect(2)
            .create_async()
            .await;

        let result = generator_for(&server, &["k1"], &["flash", "pro"])
            .write("Foo", "text", TranscriptQuality::Transcript)
            .await;
        assert!(matches!(result, Err(AppError::CredentialsExhausted(_))));
    }

    #[tokio::test]
    async fn empty_reply_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _empty = server
            .mock("POST", "/models/flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let result = generator_for(&server, &["k1"], &["flash"])
            .write("Foo", "text", TranscriptQuality::Description)
            .await;
        assert!(matches!(result, Err(AppError::GenerationApi(_))));
    }

    #[tokio::test]
    async fn lists_only_generate_content_models() {
        let mut server = mockito::Server::new_async().await;
        let _models = server
            .mock("GET", "/models")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"models": [
                    {"name": "models/gemini-1.5-flash", "displayName": "Gemini 1.5 Flash", "supportedGenerationMethods": ["generateContent", "countTokens"]},
                    {"name": "models/embedding-001", "displayName": "Embedding", "supportedGenerationMethods": ["embedContent"]}
                ]}"#,
            )
            .create_async()
            .await;

        let models = generator_for(&server, &["k1"], &["flash"])
            .list_models()
            .await
            .unwrap();

        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "models/gemini-1.5-flash");
        assert_eq!(models[0].display_name, "Gemini 1.5 Flash");
    }
}
