use std::sync::OnceLock;

use regex::Regex;

static DISALLOWED: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

/// Strip emoji and other symbols from a title, keeping letters, digits and
/// basic punctuation, then normalize whitespace.
pub fn clean_title(title: &str) -> String {
    let disallowed = DISALLOWED.get_or_init(|| {
        Regex::new(r#"[^\w\s\u{00C0}-\u{00FF}.,!¡?¿\-:;"']"#).expect("valid title regex")
    });
    let whitespace = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"));

    let stripped = disallowed.replace_all(title, "");
    whitespace.replace_all(&stripped, " ").trim().to_string()
}

/// Canonical short playback URL for a video id.
pub fn source_url(video_id: &str) -> String {
    format!("https://youtu.be/{}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_basic_punctuation() {
        assert_eq!(clean_title("Breaking: Foo!!"), "Breaking: Foo!!");
        assert_eq!(clean_title("¿Qué pasó? ¡Última hora!"), "¿Qué pasó? ¡Última hora!");
        assert_eq!(clean_title("It's \"news\"; a-b, c."), "It's \"news\"; a-b, c.");
    }

    #[test]
    fn strips_symbols_and_collapses_whitespace() {
        assert_eq!(clean_title("  Breaking:   Foo!! 🚀🔥 "), "Breaking: Foo!!");
        assert_eq!(clean_title("A | B #tag @x"), "A B tag x");
        assert_eq!(clean_title("🔴"), "");
    }

    #[test]
    fn source_url_is_derived_from_id() {
        assert_eq!(source_url("abc123"), "https://youtu.be/abc123");
    }
}
