//! Stand-in for the page's hidden download frame: fetches whatever URL the
//! frame is pointed at and writes it to disk.

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderValue, CONTENT_DISPOSITION};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, ViewerError};
use crate::surface::{Surface, ViewerEvent};

const STREAM_TIMEOUT_SECS: u64 = 20;
const WRITE_QUEUE: usize = 256;
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);
const FALLBACK_NAME: &str = "download";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDownload {
    pub url: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub hash: String,
}

pub struct Downloader {
    client: Client,
    origin: Url,
    dir: PathBuf,
    surface: Arc<dyn Surface>,
}

impl Downloader {
    /// `origin` resolves relative download hrefs such as `/api/file/x?download`.
    pub fn new(client: Client, origin: Url, dir: PathBuf, surface: Arc<dyn Surface>) -> Self {
        Self {
            client,
            origin,
            dir,
            surface,
        }
    }

    pub fn resolve(&self, href: &str) -> Result<Url> {
        Ok(self.origin.join(href)?)
    }

    pub async fn fetch(&self, href: &str) -> Result<CompletedDownload> {
        let url = self.resolve(href)?;
        self.surface.log(format!("[*] Starting download: {url}"));

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "download refused");
            self.surface
                .log(format!("[!] Server refused the download: {status}"));
            return Err(ViewerError::Status(status.as_u16()));
        }

        let total = response.content_length().unwrap_or(0);
        let name = file_name(response.headers().get(CONTENT_DISPOSITION), &url);
        let path = self.dir.join(name);
        info!(%url, path = %path.display(), total, "downloading");

        let (tx, rx) = mpsc::channel::<Bytes>(WRITE_QUEUE);
        let writer_path = path.clone();
        let writer = tokio::task::spawn_blocking(move || write_and_hash(&writer_path, rx));

        let mut stream = response.bytes_stream();
        let start = Instant::now();
        let mut last_progress = start;
        let mut downloaded: u64 = 0;
        let mut failure = None;

        loop {
            match tokio::time::timeout(Duration::from_secs(STREAM_TIMEOUT_SECS), stream.next()).await
            {
                Ok(Some(Ok(chunk))) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    downloaded = downloaded.saturating_add(chunk.len() as u64);
                    if tx.send(chunk).await.is_err() {
                        // Writer gave up; its error is reported below.
                        break;
                    }
                    if last_progress.elapsed() >= PROGRESS_INTERVAL {
                        last_progress = Instant::now();
                        self.progress(downloaded, total, start);
                    }
                }
                Ok(Some(Err(err))) => {
                    failure = Some(ViewerError::from(err));
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    failure = Some(ViewerError::Http(format!(
                        "download stalled for {STREAM_TIMEOUT_SECS}s"
                    )));
                    break;
                }
            }
        }
        drop(tx);

        let written = writer
            .await
            .map_err(|err| ViewerError::Io(format!("writer task failed: {err}")))
            .and_then(|res| res.map_err(ViewerError::from));
        let hash = match (failure, written) {
            (None, Ok(hash)) => hash,
            (Some(err), _) | (None, Err(err)) => {
                discard_partial(&path);
                self.surface.log(format!("[!] Download failed: {err}"));
                return Err(err);
            }
        };
        self.progress(downloaded, total.max(downloaded), start);

        let path_text = path.to_string_lossy().to_string();
        self.surface
            .log(format!("[+] SHA256 verification hash: {hash}"));
        self.surface.emit(ViewerEvent::DownloadComplete {
            url: url.to_string(),
            path: path_text,
            hash: hash.clone(),
        });

        Ok(CompletedDownload {
            url: url.to_string(),
            path,
            bytes: downloaded,
            hash,
        })
    }

    fn progress(&self, downloaded: u64, total: u64, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        let speed_mbps = if elapsed > 0.0 {
            (downloaded as f64 / elapsed) / 1048576.0
        } else {
            0.0
        };
        self.surface.emit(ViewerEvent::Progress {
            downloaded,
            total,
            speed_mbps,
        });
    }
}

fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "could not remove partial download"),
    }
}

fn write_and_hash(path: &Path, mut rx: mpsc::Receiver<Bytes>) -> std::io::Result<String> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = File::create(path)?;
    let mut hasher = Sha256::new();
    while let Some(chunk) = rx.blocking_recv() {
        file.write_all(&chunk)?;
        hasher.update(&chunk);
    }
    file.flush()?;
    Ok(hex::encode(hasher.finalize()))
}

/// Local file name from `Content-Disposition`, else the last URL segment.
/// Directory components are stripped.
fn file_name(disposition: Option<&HeaderValue>, url: &Url) -> String {
    let from_header = disposition
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value.split(';').find_map(|part| {
                part.trim()
                    .strip_prefix("filename=")
                    .map(|name| name.trim_matches('"').to_string())
            })
        });
    let from_url = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string);

    from_header
        .into_iter()
        .chain(from_url)
        .find_map(|candidate| sanitize(&candidate))
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

fn sanitize(candidate: &str) -> Option<String> {
    let normalized = candidate.replace('\\', "/");
    let name = Path::new(&normalized).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
