use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::app::ArticleStore;
use crate::error::Result;
use crate::models::{InsertOutcome, NewProcessedVideo};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path.as_ref()).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn contains(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let found: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM processed_videos WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await?;
        Ok(exists)
    }

    /// Append-only insert. A second insert of the same id is reported, not raised.
    pub async fn insert_video(&self, video: NewProcessedVideo) -> Result<InsertOutcome> {
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT INTO processed_videos (id, title, content, source_url, quality, processed_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(id) DO NOTHING"#,
                    params![
                        video.id,
                        video.title,
                        video.content,
                        video.source_url,
                        video.quality.as_str(),
                        video.processed_at.to_rfc3339(),
                    ],
                )?;
                Ok(changed)
            })
            .await?;

        Ok(if changed == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }

    pub async fn count_videos(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM processed_videos", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for Repository {
    async fn exists(&self, video_id: &str) -> Result<bool> {
        self.contains(video_id).await
    }

    async fn insert(&self, video: NewProcessedVideo) -> Result<InsertOutcome> {
        self.insert_video(video).await
    }
}

/// Read-back used by tests; the pipeline itself only appends.
#[cfg(test)]
impl Repository {
    pub async fn get_video(&self, id: &str) -> Result<Option<crate::models::ProcessedVideo>> {
        let id = id.to_string();
        let video = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, content, source_url, quality, processed_at FROM processed_videos WHERE id = ?1",
                )?;
                let video = stmt
                    .query_row(params![id], processed_video_from_row)
                    .optional()?;
                Ok(video)
            })
            .await?;
        Ok(video)
    }
}

#[cfg(test)]
fn parse_datetime(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

#[cfg(test)]
fn processed_video_from_row(row: &rusqlite::Row) -> rusqlite::Result<crate::models::ProcessedVideo> {
    let quality = match row.get::<_, String>(4)?.as_str() {
        "description" => crate::models::TranscriptQuality::Description,
        _ => crate::models::TranscriptQuality::Transcript,
    };

    Ok(crate::models::ProcessedVideo {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        source_url: row.get(3)?,
        quality,
        processed_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(chrono::Utc::now),
    })
}
