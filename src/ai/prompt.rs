use std::sync::OnceLock;

use regex::Regex;

use crate::models::TranscriptQuality;

static H1: OnceLock<Regex> = OnceLock::new();

/// The first `budget` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub fn build_prompt(title: &str, text: &str, quality: TranscriptQuality, min_words: usize) -> String {
    match quality {
        TranscriptQuality::Transcript => format!(
            r#"You are a professional news journalist. Write a news article in HTML about the video "{title}" using the transcript below.

Requirements:
- At least {min_words} words, in the language of the transcript.
- Structure the article with <h2> section headings, <p> paragraphs and <ul>/<li> lists where they help.
- Professional, neutral tone. Report what was said; do not invent facts.
- Do not include an <h1> title, <html>, <head> or <body> tags, or Markdown. Return only the HTML body.

Transcript:
{text}"#
        ),
        TranscriptQuality::Description => format!(
            r#"You are a professional news journalist. Write a BRIEF news article in HTML based only on the description of the video "{title}" below.

Requirements:
- Two to four short paragraphs, in the language of the description.
- Use <h2> and <p> elements only. Professional, neutral tone. Do not invent facts.
- Do not include an <h1> title, <html>, <head> or <body> tags, or Markdown. Return only the HTML body.

Description:
{text}"#
        ),
    }
}

/// Normalize model output into an article body: drop Markdown code fences and
/// any top-level `<h1>` title.
pub fn clean_article(raw: &str) -> String {
    let h1 = H1.get_or_init(|| Regex::new(r"(?is)<h1[^>]*>.*?</h1>").expect("valid h1 regex"));

    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Skip the language tag on the opening fence
        body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
        body = body.trim_end().strip_suffix("```").unwrap_or(body);
    }

    h1.replace_all(body, "").trim().to_string()
}

pub fn word_count(html: &str) -> usize {
    match html2text::from_read(html.as_bytes(), 120) {
        Ok(text) => text
            .split_whitespace()
            .filter(|w| w.chars().any(char::is_alphanumeric))
            .count(),
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            0
        }
    }
}
