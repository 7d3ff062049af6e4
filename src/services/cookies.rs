use std::path::Path;

use reqwest::header::{HeaderValue, COOKIE};
use reqwest::RequestBuilder;

use crate::error::Result;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// Build a `Cookie` header value for `domain` from a Netscape cookies.txt
/// export (the format yt-dlp and browser extensions write).
pub fn cookie_header(cookies_file: &Path, domain: &str) -> Result<String> {
    if !cookies_file.exists() {
        tracing::debug!("Cookie file {:?} not found", cookies_file);
        return Ok(String::new());
    }

    let content = std::fs::read_to_string(cookies_file)?;
    Ok(parse_netscape(&content, domain).join("; "))
}

/// Attach the cookie header to a request when there is one.
pub fn with_cookies(request: RequestBuilder, header: &str) -> RequestBuilder {
    if header.is_empty() {
        return request;
    }
    match HeaderValue::from_str(header) {
        Ok(value) => request.header(COOKIE, value),
        Err(_) => request,
    }
}

fn parse_netscape(content: &str, domain: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.strip_prefix(HTTP_ONLY_PREFIX).unwrap_or(line);
            if line.starts_with('#') || line.trim().is_empty() {
                return None;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 7 {
                return None;
            }

            let host = fields[0].trim_start_matches('.');
            if domain == host || domain.ends_with(&format!(".{}", host)) {
                Some(format!("{}={}", fields[5], fields[6].trim_end()))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOKIES: &str = "# Netscape HTTP Cookie File\n\
.youtube.com\tTRUE\t/\tTRUE\t0\tSID\tabc\n\
#HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t0\tHSID\tdef\n\
.example.com\tTRUE\t/\tFALSE\t0\tOTHER\tzzz\n\
malformed line\n";

    #[test]
    fn picks_cookies_for_domain_and_subdomains() {
        let cookies = parse_netscape(COOKIES, "www.youtube.com");
        assert_eq!(cookies, vec!["SID=abc", "HSID=def"]);
    }

    #[test]
    fn missing_file_yields_no_header() {
        let header = cookie_header(Path::new("/definitely/not/here.txt"), "youtube.com").unwrap();
        assert!(header.is_empty());
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        std::fs::write(&path, COOKIES).unwrap();

        let header = cookie_header(&path, "youtube.com").unwrap();
        assert_eq!(header, "SID=abc; HSID=def");
    }
}
