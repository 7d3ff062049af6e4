pub const SCHEMA: &str = r#"
-- processed_videos table: one row per video that made it through the pipeline
CREATE TABLE IF NOT EXISTS processed_videos (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    source_url TEXT NOT NULL,
    quality TEXT NOT NULL DEFAULT 'transcript',
    processed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_processed_videos_processed_at ON processed_videos(processed_at DESC);
"#;
