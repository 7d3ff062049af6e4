use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";
pub const TRANSCRIPT_API_BASE: &str = "https://api.supadata.ai/v1";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    // Required, usually supplied through the environment
    pub channel_id: String,
    pub youtube_api_key: String,
    pub gemini_api_keys: Vec<String>,
    pub database_url: String,

    // Optional credentials
    pub transcript_api_keys: Vec<String>,
    pub cookies_file: Option<PathBuf>,
    pub audio_fetch_service: Option<String>,
    pub audio_mirrors: Vec<String>,

    // Tunables
    pub max_videos: u32,
    pub caption_languages: Vec<String>,
    pub text_budget: usize,
    pub min_description_chars: usize,
    pub min_words: usize,
    pub generation_models: Vec<String>,
    pub retry_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub speech_to_text: bool,
    pub downloader_command: String,
    pub transcriber_command: Vec<String>,
    pub work_dir: Option<PathBuf>,

    // Endpoints
    pub youtube_api_base: String,
    pub timedtext_url: String,
    pub transcript_api_base: String,
    pub gemini_api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_id: String::new(),
            youtube_api_key: String::new(),
            gemini_api_keys: Vec::new(),
            database_url: String::new(),
            transcript_api_keys: Vec::new(),
            cookies_file: None,
            audio_fetch_service: None,
            audio_mirrors: Vec::new(),
            max_videos: 5,
            caption_languages: vec!["es".to_string(), "es-419".to_string(), "en".to_string()],
            text_budget: 25_000,
            min_description_chars: 50,
            min_words: 300,
            generation_models: vec![
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
            ],
            retry_delay_ms: 1000,
            http_timeout_secs: 60,
            generation_timeout_secs: 120,
            command_timeout_secs: 900,
            speech_to_text: true,
            downloader_command: "yt-dlp".to_string(),
            transcriber_command: [
                "whisper",
                "{input}",
                "--model",
                "base",
                "--output_format",
                "txt",
                "--output_dir",
                "{output_dir}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            work_dir: None,
            youtube_api_base: YOUTUBE_API_BASE.to_string(),
            timedtext_url: TIMEDTEXT_URL.to_string(),
            transcript_api_base: TRANSCRIPT_API_BASE.to_string(),
            gemini_api_base: GEMINI_API_BASE.to_string(),
        }
    }
}

impl Config {
    /// Load the optional config file, overlay the environment and validate.
    pub fn load() -> Result<Self> {
        let config = Self::read()?;
        config.validate()?;
        Ok(config)
    }

    /// Config file plus environment, without validation.
    pub fn read() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("TUBE_NEWS_CONFIG") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tube-news")
            .join("config.toml")
    }

    /// Overlay values from the environment. Unset or blank variables leave the
    /// file value in place.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("CHANNEL_ID") {
            self.channel_id = v.trim().to_string();
        }
        if let Some(v) = get("YOUTUBE_API_KEY") {
            self.youtube_api_key = v.trim().to_string();
        }
        if let Some(v) = get("GEMINI_API_KEYS").or_else(|| get("GEMINI_API_KEY")) {
            self.gemini_api_keys = split_list(&v);
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database_url = v.trim().to_string();
        }
        if let Some(v) = get("TRANSCRIPT_API_KEYS") {
            self.transcript_api_keys = split_list(&v);
        }
        if let Some(v) = get("YOUTUBE_COOKIES_FILE") {
            self.cookies_file = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("AUDIO_FETCH_SERVICE") {
            self.audio_fetch_service = Some(v.trim().to_string());
        }
        if let Some(v) = get("AUDIO_MIRRORS") {
            self.audio_mirrors = split_list(&v);
        }
    }

    /// Fails on anything that would make the run pointless, before any
    /// external call is made.
    pub fn validate(&self) -> Result<()> {
        if self.channel_id.is_empty() {
            return Err(AppError::Config("CHANNEL_ID is not set".to_string()));
        }
        if self.youtube_api_key.is_empty() {
            return Err(AppError::Config("YOUTUBE_API_KEY is not set".to_string()));
        }
        if self.gemini_api_keys.is_empty() {
            return Err(AppError::Config("GEMINI_API_KEY is not set".to_string()));
        }
        if self.generation_models.is_empty() {
            return Err(AppError::Config(
                "generation_models must name at least one model".to_string(),
            ));
        }
        if self.text_budget == 0 {
            return Err(AppError::Config("text_budget must be positive".to_string()));
        }
        self.database_path()?;

        let endpoints = [
            &self.youtube_api_base,
            &self.timedtext_url,
            &self.transcript_api_base,
            &self.gemini_api_base,
        ];
        for endpoint in endpoints
            .into_iter()
            .chain(self.audio_fetch_service.iter())
            .chain(self.audio_mirrors.iter())
        {
            url::Url::parse(endpoint)
                .map_err(|e| AppError::Config(format!("Invalid URL {:?}: {}", endpoint, e)))?;
        }
        Ok(())
    }

    /// Resolve `DATABASE_URL` to a SQLite file path.
    pub fn database_path(&self) -> Result<PathBuf> {
        let url = self.database_url.trim();
        if url.is_empty() {
            return Err(AppError::Config("DATABASE_URL is not set".to_string()));
        }

        let path = if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite:") {
            rest
        } else if url.contains("://") {
            return Err(AppError::Config(format!(
                "Unsupported DATABASE_URL scheme: {}",
                url.split("://").next().unwrap_or_default()
            )));
        } else {
            url
        };

        if path.is_empty() {
            return Err(AppError::Config("DATABASE_URL has no path".to_string()));
        }
        Ok(PathBuf::from(path))
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
