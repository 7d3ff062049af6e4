use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YouTube API error: {0}")]
    YouTubeApi(String),

    #[error("Transcript service error: {0}")]
    TranscriptApi(String),

    #[error("Generation API error: {0}")]
    GenerationApi(String),

    #[error("All credentials for {0} were rejected or exhausted")]
    CredentialsExhausted(String),

    #[error("External command failed: {0}")]
    Command(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::Toml(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
