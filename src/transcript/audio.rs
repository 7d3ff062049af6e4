use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Video;
use crate::services::build_client;

/// One network path to a video's audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioRoute {
    /// `yt-dlp` straight against YouTube.
    Direct,
    /// A service that fetches a URL on our behalf and returns the audio bytes.
    FetchService(String),
    /// A Piped-compatible front-end mirror.
    Mirror(String),
}

impl AudioRoute {
    fn label(&self) -> &str {
        match self {
            AudioRoute::Direct => "direct",
            AudioRoute::FetchService(url) | AudioRoute::Mirror(url) => url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsResponse {
    #[serde(default)]
    audio_streams: Vec<AudioStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioStream {
    url: String,
    #[serde(default)]
    bitrate: u64,
    #[serde(default)]
    mime_type: String,
}

pub struct AudioFetcher {
    client: Client,
    routes: Vec<AudioRoute>,
    downloader: String,
    cookies_file: Option<PathBuf>,
    command_timeout: Duration,
}

impl AudioFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let mut routes = vec![AudioRoute::Direct];
        if let Some(service) = &config.audio_fetch_service {
            routes.push(AudioRoute::FetchService(service.clone()));
        }
        routes.extend(
            config
                .audio_mirrors
                .iter()
                .map(|m| AudioRoute::Mirror(m.trim_end_matches('/').to_string())),
        );

        Ok(Self {
            client: build_client(config.command_timeout_secs)?,
            routes,
            downloader: config.downloader_command.clone(),
            cookies_file: config.cookies_file.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn with_routes(mut self, routes: Vec<AudioRoute>) -> Self {
        self.routes = routes;
        self
    }

    pub fn routes(&self) -> &[AudioRoute] {
        &self.routes
    }

    /// Download the audio track into `dir`, trying each route in order.
    pub async fn download(&self, video: &Video, dir: &Path) -> Result<PathBuf> {
        for route in &self.routes {
            let result = match route {
                AudioRoute::Direct => self.download_direct(video, dir).await,
                AudioRoute::FetchService(service) => self.download_via_service(service, video, dir).await,
                AudioRoute::Mirror(mirror) => self.download_via_mirror(mirror, video, dir).await,
            };

            match result {
                Ok(path) => {
                    tracing::debug!(video_id = %video.id, route = route.label(), "Audio downloaded");
                    return Ok(path);
                }
                Err(e) => {
                    tracing::debug!(video_id = %video.id, route = route.label(), "Audio route failed: {}", e);
                }
            }
        }

        Err(AppError::Command(format!(
            "no audio route worked for {}",
            video.id
        )))
    }

    async fn download_direct(&self, video: &Video, dir: &Path) -> Result<PathBuf> {
        let template = dir.join("direct.%(ext)s");
        let mut args = vec![
            "-f".to_string(),
            "bestaudio".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
        ];
        if let Some(cookies) = &self.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args.push(video.watch_url());

        run_command(&self.downloader, &args, self.command_timeout).await?;

        find_file(dir, |name| name.starts_with("direct.") && !name.ends_with(".part"))
            .await?
            .ok_or_else(|| AppError::Command("downloader produced no audio file".to_string()))
    }

    async fn download_via_service(&self, service: &str, video: &Video, dir: &Path) -> Result<PathBuf> {
        let response = self
            .client
            .get(service)
            .query(&[("url", video.watch_url())])
            .send()
            .await?;
        let path = dir.join("service.audio");
        self.save_response(response, &path).await?;
        Ok(path)
    }

    async fn download_via_mirror(&self, mirror: &str, video: &Video, dir: &Path) -> Result<PathBuf> {
        let response = self
            .client
            .get(format!("{}/streams/{}", mirror, urlencoding::encode(&video.id)))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Command(format!("mirror returned {}", response.status())));
        }

        let streams: StreamsResponse = response.json().await?;
        let best = streams
            .audio_streams
            .into_iter()
            .max_by_key(|s| s.bitrate)
            .ok_or_else(|| AppError::Command("mirror listed no audio streams".to_string()))?;

        let extension = if best.mime_type.contains("mp4") { "m4a" } else { "webm" };
        let path = dir.join(format!("mirror.{}", extension));
        let response = self.client.get(&best.url).send().await?;
        self.save_response(response, &path).await?;
        Ok(path)
    }

    async fn save_response(&self, mut response: reqwest::Response, path: &Path) -> Result<()> {
        if !response.status().is_success() {
            return Err(AppError::Command(format!("download returned {}", response.status())));
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(AppError::Command("download was empty".to_string()));
        }
        Ok(())
    }
}

/// Run an external program, killing it if it outlives `timeout`.
pub(super) async fn run_command(program: &str, args: &[String], timeout: Duration) -> Result<()> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(AppError::Command(format!(
                "{} timed out after {}s",
                program,
                timeout.as_secs()
            )))
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Command(format!(
            "{} exited with {:?}: {}",
            program,
            output.status.code(),
            stderr.trim()
        )));
    }
    Ok(())
}

pub(super) async fn find_file<F>(dir: &Path, matches: F) -> Result<Option<PathBuf>>
where
    F: Fn(&str) -> bool,
{
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if path.is_file() && matches(&name) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_follow_config_order() {
        let config = Config {
            audio_fetch_service: Some("https://fetch.example/get".to_string()),
            audio_mirrors: vec!["https://pipedapi.one/".to_string(), "https://pipedapi.two".to_string()],
            ..Config::default()
        };
        let fetcher = AudioFetcher::new(&config).unwrap();
        assert_eq!(
            fetcher.routes(),
            &[
                AudioRoute::Direct,
                AudioRoute::FetchService("https://fetch.example/get".to_string()),
                AudioRoute::Mirror("https://pipedapi.one".to_string()),
                AudioRoute::Mirror("https://pipedapi.two".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn falls_through_to_mirror_with_best_stream() {
        let mut server = mockito::Server::new_async().await;
        let _streams = server
            .mock("GET", "/streams/abc123")
            .with_status(200)
            .with_body(format!(
                r#"{{"audioStreams": [
                    {{"url": "{0}/low", "bitrate": 48000, "mimeType": "audio/webm"}},
                    {{"url": "{0}/high", "bitrate": 128000, "mimeType": "audio/mp4"}}
                ]}}"#,
                server.url()
            ))
            .create_async()
            .await;
        let high = server
            .mock("GET", "/high")
            .with_status(200)
            .with_body("AUDIO")
            .create_async()
            .await;

        let config = Config {
            downloader_command: "tube-news-missing-downloader".to_string(),
            ..Config::default()
        };
        let fetcher = AudioFetcher::new(&config)
            .unwrap()
            .with_routes(vec![AudioRoute::Direct, AudioRoute::Mirror(server.url())]);

        let dir = tempfile::tempdir().unwrap();
        let path = fetcher
            .download(&Video::new("abc123", "t"), dir.path())
            .await
            .unwrap();

        high.assert_async().await;
        assert_eq!(path.file_name().unwrap(), "mirror.m4a");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "AUDIO");
    }

    #[tokio::test]
    async fn every_route_failing_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _service = server
            .mock("GET", "/fetch")
            .match_query(mockito::Matcher::Any)
            .with_status(502)
            .create_async()
            .await;

        let config = Config {
            downloader_command: "tube-news-missing-downloader".to_string(),
            ..Config::default()
        };
        let fetcher = AudioFetcher::new(&config)
            .unwrap()
            .with_routes(vec![
                AudioRoute::Direct,
                AudioRoute::FetchService(format!("{}/fetch", server.url())),
            ]);

        let dir = tempfile::tempdir().unwrap();
        let result = fetcher.download(&Video::new("abc123", "t"), dir.path()).await;
        assert!(matches!(result, Err(AppError::Command(_))));
    }

    #[tokio::test]
    async fn command_timeout_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let args = vec![
            "-c".to_string(),
            format!("sleep 1 && touch '{}'", marker.display()),
        ];

        let started = std::time::Instant::now();
        let result = run_command("sh", &args, Duration::from_millis(100)).await;

        assert!(matches!(result, Err(AppError::Command(ref msg)) if msg.contains("timed out")));
        assert!(started.elapsed() < Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_command_error() {
        let args = vec!["-c".to_string(), "echo nope >&2; exit 3".to_string()];
        let result = run_command("sh", &args, Duration::from_secs(5)).await;

        assert!(matches!(result, Err(AppError::Command(ref msg)) if msg.contains("nope")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn direct_download_passes_cookie_file() {
        use std::os::unix::fs::PermissionsExt;

        let tools = tempfile::tempdir().unwrap();
        let downloader = tools.path().join("fake-downloader");
        std::fs::write(
            &downloader,
            r#"#!/bin/sh
out=""
cookies=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    --cookies) cookies="$2"; shift ;;
  esac
  shift
done
[ -n "$cookies" ] || exit 3
printf '%s' "$cookies" > "$(printf '%s' "$out" | sed 's/%(ext)s/m4a/')"
"#,
        )
        .unwrap();
        std::fs::set_permissions(&downloader, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cookies = tools.path().join("cookies.txt");
        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();

        let config = Config {
            downloader_command: downloader.to_string_lossy().to_string(),
            cookies_file: Some(cookies.clone()),
            ..Config::default()
        };
        let fetcher = AudioFetcher::new(&config)
            .unwrap()
            .with_routes(vec![AudioRoute::Direct]);

        let dir = tempfile::tempdir().unwrap();
        let path = fetcher
            .download(&Video::new("abc123", "t"), dir.path())
            .await
            .unwrap();

        assert_eq!(path.file_name().unwrap(), "direct.m4a");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            cookies.to_string_lossy()
        );
    }
}
